//! Cached translation of C sources into native-language source.
//!
//! Translation is expensive (a full C front-end run), so its output is
//! cached exactly like a C object. A failed translation still writes its
//! manifest — with no file dependencies — so the next invocation observes a
//! hit, recognizes the empty file list as a recorded failure, rolls the
//! manifest back with `unhit`, and re-runs the translator.

use crate::cc_args::{add_cc_args, CSourceKind};
use crate::compilation::{Compilation, CrtFile};
use crate::error::DriverError;
use kiln_diagnostics::Diagnostic;
use std::path::{Path, PathBuf};

/// Basename of the translated source inside its cache artifact directory.
const TRANSLATED_BASENAME: &str = "translated.kn";

/// What a successful translation produced.
#[derive(Clone, Debug)]
pub struct TranslateOutput {
    /// The translated native-language source text.
    pub source: String,
    /// Every file the C front-end read, including the input itself.
    pub deps: Vec<PathBuf>,
}

/// The C front-end's translation service.
pub trait CTranslator {
    /// Translates one C source, given the fully expanded compiler
    /// arguments. `Err` carries the C diagnostics as rendered text.
    fn translate(&mut self, argv: &[String], src_path: &Path)
        -> Result<TranslateOutput, String>;
}

impl Compilation {
    /// Translates a C source into native-language source, cached.
    ///
    /// Returns the translated file inside the cache together with the lock
    /// that keeps it alive.
    pub fn translate_c(
        &mut self,
        translator: &mut dyn CTranslator,
        src_path: &Path,
    ) -> Result<CrtFile, DriverError> {
        let content = std::fs::read(src_path).map_err(|e| DriverError::io(src_path, e))?;

        let mut argv = Vec::new();
        add_cc_args(
            self.options(),
            self.config(),
            self.lib_dir().path(),
            CSourceKind::C,
            None,
            &mut argv,
        );

        let cache = self.local_cache().clone();
        let mut manifest = cache.obtain();
        manifest.add_str("translate-c");
        for arg in &argv {
            manifest.add_str(arg);
        }
        // The input is hashed as a blob: a failure must leave the manifest
        // with zero recorded files so it reads as "retry me".
        manifest.add_bytes(&content);

        let snapshot = manifest.snapshot();
        let mut hit = manifest.hit()?;
        if hit && manifest.files().is_empty() {
            // A previous run recorded a failure; disprove the hit.
            manifest.unhit(snapshot);
            hit = false;
        }

        if !hit {
            match translator.translate(&argv, src_path) {
                Ok(output) => {
                    for dep in &output.deps {
                        manifest.add_file(dep)?;
                    }
                    if output.deps.is_empty() {
                        // Guarantee a non-empty file list on success.
                        manifest.add_file(src_path)?;
                    }
                    let tmp = cache.tmp_path(TRANSLATED_BASENAME)?;
                    std::fs::write(&tmp, &output.source)
                        .map_err(|e| DriverError::io(&tmp, e))?;
                    let digest = manifest.final_digest();
                    cache.rename_into_cache(&tmp, &digest, TRANSLATED_BASENAME)?;
                    if let Err(e) = manifest.write_manifest() {
                        self.sink().emit(Diagnostic::warning(format!(
                            "unable to write cache manifest: {e}"
                        )));
                    }
                }
                Err(message) => {
                    // Record the failure (zero files) so the next run
                    // retries, then surface the C diagnostics.
                    if let Err(e) = manifest.write_manifest() {
                        self.sink().emit(Diagnostic::warning(format!(
                            "unable to write cache manifest: {e}"
                        )));
                    }
                    return Err(DriverError::Link(format!(
                        "unable to translate {}: {message}",
                        src_path.display()
                    )));
                }
            }
        }

        let path = cache.artifact_path(&manifest.final_digest(), TRANSLATED_BASENAME);
        let lock = manifest
            .take_lock()
            .ok_or_else(|| kiln_common::InternalError::new("translate-c manifest has no lock"))?;
        Ok(CrtFile {
            full_object_path: path,
            lock,
        })
    }
}
