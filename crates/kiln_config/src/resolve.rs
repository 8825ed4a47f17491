//! Deriving final build decisions from the user options and target.
//!
//! `resolve` runs a fixed sequence of rules: each decision either takes the
//! user's explicit request (rejecting it when the target forbids it) or
//! derives a default from the target and the decisions made so far. The
//! order matters; later rules read earlier results.

use crate::error::ConfigError;
use crate::types::{CompilationOptions, LinkMode, OptimizeMode, OutputMode};
use kiln_target::{CodeModel, ObjectFormat};

/// The consistent set of build decisions derived from [`CompilationOptions`].
#[derive(Clone, Debug)]
pub struct ResolvedConfig {
    /// The output is a dynamic library.
    pub is_dyn_lib: bool,
    /// The output is an executable or a dynamic library.
    pub is_exe_or_dyn_lib: bool,
    /// Machine code comes from the LLVM back-end.
    pub use_llvm: bool,
    /// Linking is done by LLD rather than the self-hosted linker.
    pub use_lld: bool,
    /// The image links the target's C library.
    pub link_libc: bool,
    /// The configuration forces a dynamically linked image.
    pub must_dynamic_link: bool,
    /// The resolved link mode.
    pub link_mode: LinkMode,
    /// Functions are exported from produced DLLs.
    pub dll_export_fns: bool,
    /// The target or link mode mandates position-independent code.
    pub must_pic: bool,
    /// Position-independent code is enabled.
    pub pic: bool,
    /// C/C++ inputs are compiled by clang rather than the self-hosted
    /// front-end.
    pub use_clang: bool,
    /// Safety checks are active (Debug or ReleaseSafe).
    pub is_safe_mode: bool,
    /// C code is compiled with UB sanitizing (trap mode).
    pub sanitize_c: bool,
    /// Stack-probe checking is enabled.
    pub stack_check: bool,
    /// Valgrind client requests are compiled in.
    pub valgrind: bool,
    /// The build has no thread support.
    pub single_threaded: bool,
    /// Debug info is omitted.
    pub strip: bool,
    /// Error-return tracing is compiled in.
    pub error_return_tracing: bool,
    /// The resolved object format.
    pub object_format: ObjectFormat,
    /// The machine code model.
    pub code_model: CodeModel,
    /// NUL-terminated LLVM CPU feature string, when the LLVM back-end is
    /// active (the buffer is handed to the LLVM C API verbatim).
    pub llvm_cpu_features: Option<Vec<u8>>,
}

/// Derives the final build decisions, rejecting inconsistent requests.
///
/// `llvm_available` states whether this Kiln binary was built with LLVM
/// support; it gates the back-end and C front-end defaults.
pub fn resolve(
    options: &CompilationOptions,
    llvm_available: bool,
) -> Result<ResolvedConfig, ConfigError> {
    let target = &options.target;

    // 1. Only a Lib output linked dynamically is a dynamic library.
    let is_dyn_lib = match options.output_mode {
        OutputMode::Obj | OutputMode::Exe => false,
        OutputMode::Lib => options.link_mode == Some(LinkMode::Dynamic),
    };

    // 2.
    let is_exe_or_dyn_lib = options.output_mode == OutputMode::Exe || is_dyn_lib;

    // 3. Back-end selection.
    let use_llvm = match options.use_llvm {
        Some(x) => x,
        None => {
            if !options.have_root_module {
                false
            } else {
                options.is_stage1
            }
        }
    };

    // 4. Only LLVM honors non-default code models.
    if options.machine_code_model != CodeModel::Default && !use_llvm {
        return Err(ConfigError::MachineCodeModelNotSupported {
            model: format!("{:?}", options.machine_code_model).to_lowercase(),
        });
    }

    let object_format = options
        .object_format
        .unwrap_or_else(|| target.default_object_format());

    // 5. Linker selection.
    let use_lld = match options.use_lld {
        Some(x) => x,
        None => {
            if !llvm_available || object_format == ObjectFormat::C {
                false
            } else if !options.link_objects.is_empty()
                || !options.c_source_files.is_empty()
                || !options.frameworks.is_empty()
                || !options.system_libs.is_empty()
                || options.link_libc
                || options.link_libcpp
                || options.eh_frame_hdr
                || options.emit_relocs
                || options.output_mode == OutputMode::Lib
                || options.linker_script.is_some()
                || options.version_script.is_some()
                || !options.extra_lld_args.is_empty()
            {
                true
            } else {
                use_llvm && options.have_root_module
            }
        }
    };

    // 6.
    let link_libc = options.link_libc || target.os_requires_libc();

    // 6a. An installed libc must actually be installed.
    if link_libc && !target.libc_provided_by_toolchain() && !target.os_requires_libc() {
        match &options.libc_installation {
            None => {
                return Err(ConfigError::LibcInstallationNotAvailable {
                    target: target.to_string(),
                })
            }
            Some(installation) => installation.validate(is_exe_or_dyn_lib)?,
        }
    }

    // 7.
    let must_dynamic_link = if !target.dynamic_linking_allowed() {
        false
    } else if is_exe_or_dyn_lib
        && link_libc
        && (target.is_glibc() || target.os_requires_libc())
    {
        true
    } else {
        !options.system_libs.is_empty()
    };

    // 8.
    let link_mode = match options.link_mode {
        Some(LinkMode::Static) if must_dynamic_link => {
            let reason = if !options.system_libs.is_empty() {
                "system libraries are only available dynamically".to_string()
            } else {
                format!("{target} provides libc as a shared object")
            };
            return Err(ConfigError::UnableToStaticLink { reason });
        }
        Some(mode) => mode,
        None => {
            if must_dynamic_link {
                LinkMode::Dynamic
            } else {
                LinkMode::Static
            }
        }
    };

    // 9.
    let dll_export_fns = options.dll_export_fns.unwrap_or(is_dyn_lib);

    // 10.
    let must_pic = target.requires_pic(link_libc) || link_mode == LinkMode::Dynamic;
    let pic = match options.want_pic {
        Some(false) if must_pic => {
            return Err(ConfigError::TargetRequiresPic {
                target: target.to_string(),
            })
        }
        Some(x) => x,
        None => must_pic,
    };

    // 11.
    let use_clang = options.use_clang.unwrap_or(!llvm_available);

    // 12.
    let is_safe_mode = matches!(
        options.optimize_mode,
        OptimizeMode::Debug | OptimizeMode::ReleaseSafe
    );

    // 13.
    let sanitize_c = options.want_sanitize_c.unwrap_or(is_safe_mode);

    // 14.
    let stack_check = if !target.supports_stack_probing() {
        false
    } else {
        options.want_stack_check.unwrap_or(is_safe_mode)
    };

    // 15.
    let valgrind = if !target.supports_valgrind() {
        false
    } else {
        options
            .want_valgrind
            .unwrap_or(options.optimize_mode == OptimizeMode::Debug)
    };

    // 16.
    let single_threaded = options.single_threaded || target.is_single_threaded();

    // 17.
    let strip = options.strip || !target.has_debug_info();

    // 18.
    let error_return_tracing = !strip && is_safe_mode;

    // 19.
    let llvm_cpu_features = use_llvm.then(|| options.cpu_features.llvm_feature_string());

    Ok(ResolvedConfig {
        is_dyn_lib,
        is_exe_or_dyn_lib,
        use_llvm,
        use_lld,
        link_libc,
        must_dynamic_link,
        link_mode,
        dll_export_fns,
        must_pic,
        pic,
        use_clang,
        is_safe_mode,
        sanitize_c,
        stack_check,
        valgrind,
        single_threaded,
        strip,
        error_return_tracing,
        object_format,
        code_model: options.machine_code_model,
        llvm_cpu_features,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_target::Triple;

    fn opts(target: &str) -> CompilationOptions {
        let target: Triple = target.parse().unwrap();
        CompilationOptions::new("demo", target)
    }

    #[test]
    fn obj_output_is_never_a_dyn_lib() {
        let mut o = opts("x86_64-linux-gnu");
        o.link_mode = Some(LinkMode::Dynamic);
        let r = resolve(&o, true).unwrap();
        assert!(!r.is_dyn_lib);
    }

    #[test]
    fn dynamic_lib_detection() {
        let mut o = opts("x86_64-linux-gnu");
        o.output_mode = OutputMode::Lib;
        o.link_mode = Some(LinkMode::Dynamic);
        let r = resolve(&o, true).unwrap();
        assert!(r.is_dyn_lib);
        assert!(r.is_exe_or_dyn_lib);
        assert!(r.dll_export_fns, "dll_export_fns defaults to is_dyn_lib");
    }

    #[test]
    fn no_root_module_means_no_llvm() {
        let o = opts("x86_64-linux-gnu");
        let r = resolve(&o, true).unwrap();
        assert!(!r.use_llvm);
        assert!(r.llvm_cpu_features.is_none());
    }

    #[test]
    fn stage1_root_module_uses_llvm() {
        let mut o = opts("x86_64-linux-gnu");
        o.have_root_module = true;
        o.is_stage1 = true;
        let r = resolve(&o, true).unwrap();
        assert!(r.use_llvm);
        let features = r.llvm_cpu_features.unwrap();
        assert_eq!(features.last(), Some(&0), "feature buffer is a C string");
    }

    #[test]
    fn code_model_needs_llvm() {
        let mut o = opts("x86_64-linux-gnu");
        o.machine_code_model = CodeModel::Kernel;
        let err = resolve(&o, true).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MachineCodeModelNotSupported { .. }
        ));
    }

    #[test]
    fn lld_selected_for_c_inputs() {
        let mut o = opts("x86_64-linux-gnu");
        o.c_source_files
            .push(crate::types::CSourceFile::new("a.c"));
        let r = resolve(&o, true).unwrap();
        assert!(r.use_lld);
    }

    #[test]
    fn lld_not_selected_without_work_for_it() {
        let o = opts("x86_64-linux-gnu");
        let r = resolve(&o, true).unwrap();
        assert!(!r.use_lld);
    }

    #[test]
    fn lld_needs_llvm_availability() {
        let mut o = opts("x86_64-linux-gnu");
        o.link_libc = true;
        let r = resolve(&o, false).unwrap();
        assert!(!r.use_lld);
        assert!(r.use_clang, "without LLVM the driver must shell out for C");
    }

    #[test]
    fn glibc_exe_must_link_dynamically() {
        let mut o = opts("x86_64-linux-gnu");
        o.output_mode = OutputMode::Exe;
        o.link_libc = true;
        let r = resolve(&o, true).unwrap();
        assert!(r.must_dynamic_link);
        assert_eq!(r.link_mode, LinkMode::Dynamic);
    }

    #[test]
    fn musl_exe_can_link_statically() {
        let mut o = opts("x86_64-linux-musl");
        o.output_mode = OutputMode::Exe;
        o.link_libc = true;
        let r = resolve(&o, true).unwrap();
        assert!(!r.must_dynamic_link);
        assert_eq!(r.link_mode, LinkMode::Static);
    }

    #[test]
    fn static_with_system_libs_is_rejected() {
        let mut o = opts("x86_64-linux-gnu");
        o.output_mode = OutputMode::Exe;
        o.link_libc = true;
        o.system_libs.push("z".to_string());
        o.link_mode = Some(LinkMode::Static);
        let err = resolve(&o, true).unwrap_err();
        assert!(matches!(err, ConfigError::UnableToStaticLink { .. }));
    }

    #[test]
    fn pic_false_with_dynamic_link_is_rejected() {
        let mut o = opts("aarch64-linux-gnu");
        o.want_pic = Some(false);
        o.link_mode = Some(LinkMode::Dynamic);
        let err = resolve(&o, true).unwrap_err();
        assert!(matches!(err, ConfigError::TargetRequiresPic { .. }));
    }

    #[test]
    fn pic_defaults_to_must_pic() {
        let mut o = opts("x86_64-linux-gnu");
        o.output_mode = OutputMode::Exe;
        o.link_libc = true;
        let r = resolve(&o, true).unwrap();
        assert!(r.must_pic, "dynamic link forces PIC");
        assert!(r.pic);

        let o2 = opts("x86_64-linux-musl");
        let r2 = resolve(&o2, true).unwrap();
        assert!(!r2.must_pic);
        assert!(!r2.pic);
    }

    #[test]
    fn explicit_pic_true_is_kept() {
        let mut o = opts("x86_64-linux-musl");
        o.want_pic = Some(true);
        let r = resolve(&o, true).unwrap();
        assert!(r.pic && !r.must_pic);
    }

    #[test]
    fn safe_modes_enable_sanitize_and_stack_check() {
        for (mode, expect) in [
            (OptimizeMode::Debug, true),
            (OptimizeMode::ReleaseSafe, true),
            (OptimizeMode::ReleaseFast, false),
            (OptimizeMode::ReleaseSmall, false),
        ] {
            let mut o = opts("x86_64-linux-gnu");
            o.optimize_mode = mode;
            let r = resolve(&o, true).unwrap();
            assert_eq!(r.is_safe_mode, expect, "{mode:?}");
            assert_eq!(r.sanitize_c, expect, "{mode:?}");
            assert_eq!(r.stack_check, expect, "{mode:?}");
        }
    }

    #[test]
    fn stack_check_off_without_probe_support() {
        let mut o = opts("aarch64-linux-gnu");
        o.want_stack_check = Some(true);
        let r = resolve(&o, true).unwrap();
        assert!(!r.stack_check);
    }

    #[test]
    fn valgrind_only_in_debug_on_supported_targets() {
        let o = opts("x86_64-linux-gnu");
        assert!(resolve(&o, true).unwrap().valgrind);

        let mut release = opts("x86_64-linux-gnu");
        release.optimize_mode = OptimizeMode::ReleaseFast;
        assert!(!resolve(&release, true).unwrap().valgrind);

        let arm = opts("aarch64-linux-gnu");
        assert!(!resolve(&arm, true).unwrap().valgrind);
    }

    #[test]
    fn wasm_is_single_threaded_and_stripped() {
        let o = opts("wasm32-wasi");
        let r = resolve(&o, true).unwrap();
        assert!(r.single_threaded);
        assert!(r.strip, "no debug info support implies strip");
        assert!(!r.error_return_tracing);
    }

    #[test]
    fn error_return_tracing_needs_debug_info_and_safety() {
        let o = opts("x86_64-linux-gnu");
        assert!(resolve(&o, true).unwrap().error_return_tracing);

        let mut stripped = opts("x86_64-linux-gnu");
        stripped.strip = true;
        assert!(!resolve(&stripped, true).unwrap().error_return_tracing);

        let mut fast = opts("x86_64-linux-gnu");
        fast.optimize_mode = OptimizeMode::ReleaseFast;
        assert!(!resolve(&fast, true).unwrap().error_return_tracing);
    }

    #[test]
    fn msvc_libc_needs_installation() {
        let mut o = opts("x86_64-windows-msvc");
        o.link_libc = true;
        let err = resolve(&o, true).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::LibcInstallationNotAvailable { .. }
        ));
    }

    #[test]
    fn msvc_installation_without_crt_dir_rejected_for_exe() {
        let mut o = opts("x86_64-windows-msvc");
        o.link_libc = true;
        o.output_mode = OutputMode::Exe;
        o.libc_installation = Some(crate::libc::LibcInstallation {
            include_dir: Some("C:/inc".into()),
            ..Default::default()
        });
        let err = resolve(&o, true).unwrap_err();
        assert!(matches!(err, ConfigError::LibcInstallationMissingCrtDir));
    }

    #[test]
    fn freestanding_never_dynamic_links() {
        let mut o = opts("x86_64-freestanding");
        o.output_mode = OutputMode::Exe;
        o.system_libs.push("c".to_string());
        let r = resolve(&o, true).unwrap();
        assert!(!r.must_dynamic_link);
        assert_eq!(r.link_mode, LinkMode::Static);
    }

    #[test]
    fn wasi_libc_is_provided_by_the_toolchain() {
        let mut o = opts("wasm32-wasi");
        o.link_libc = true;
        let r = resolve(&o, true).unwrap();
        assert!(r.link_libc);
    }

    #[test]
    fn mingw_libc_builds_from_source_without_installation() {
        let mut o = opts("x86_64-windows-gnu");
        o.link_libc = true;
        o.output_mode = OutputMode::Exe;
        let r = resolve(&o, true).unwrap();
        assert!(r.link_libc);
    }
}
