//! The compilation object: lifecycle, scheduling, and error aggregation.

use crate::builtin::{generate_builtin_source, BUILTIN_BASENAME};
use crate::c_object::{CObject, CObjectStatus};
use crate::error::DriverError;
use crate::job::{CObjectId, GlibcFile, Job, MingwFile, MuslFile};
use crate::link::{LinkContext, LinkErrorFlags, Linker, SystemLinker};
use crate::module::{DeclState, Module, ModuleError, ModuleJob, NullModule};
use crate::runtime_libs::{BundledRuntime, CrtSourceSpec, RuntimeLibs};
use crate::stage1::Stage1Backend;
use kiln_cache::{ArtifactLock, Cache, Manifest};
use kiln_common::{Directory, InternalError};
use kiln_config::{
    resolve, CSourceFile, CompilationOptions, LinkMode, OutputMode, ResolvedConfig,
};
use kiln_diagnostics::{Diagnostic, DiagnosticSink};
use kiln_target::Os;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

/// A built C-runtime artifact: its path and the lock keeping it alive.
///
/// Dropping the record releases the lock; the path is only meaningful while
/// the record lives.
#[derive(Debug)]
pub struct CrtFile {
    /// Absolute path of the artifact inside the (global) cache.
    pub full_object_path: PathBuf,
    /// The artifact lock, released on drop.
    pub lock: ArtifactLock,
}

/// Everything needed to construct a [`Compilation`].
pub struct CreateOptions {
    /// The user-supplied options record.
    pub options: CompilationOptions,
    /// Kiln's bundled `lib/` directory.
    pub lib_dir: Directory,
    /// The per-project cache.
    pub local_cache_dir: Directory,
    /// The per-user cache shared by all projects.
    pub global_cache_dir: Directory,
    /// The language module collaborator.
    pub module: Box<dyn Module>,
    /// The linker collaborator.
    pub linker: Box<dyn Linker>,
    /// The stage1 back-end, when this build delegates to it.
    pub stage1: Option<Box<dyn Stage1Backend>>,
    /// Runtime-library recipes.
    pub runtime_libs: Box<dyn RuntimeLibs>,
    /// Sink for warnings and notes.
    pub sink: Arc<DiagnosticSink>,
    /// Whether this Kiln binary carries LLVM.
    pub llvm_available: bool,
}

impl CreateOptions {
    /// Defaults: null module, system linker, bundled runtime recipes, a
    /// fresh sink, and [`crate::LLVM_AVAILABLE`].
    pub fn new(
        options: CompilationOptions,
        lib_dir: Directory,
        local_cache_dir: Directory,
        global_cache_dir: Directory,
    ) -> Self {
        let linker = SystemLinker::new(None, None);
        Self {
            options,
            lib_dir,
            local_cache_dir,
            global_cache_dir,
            module: Box::new(NullModule::new()),
            linker: Box::new(linker),
            stage1: None,
            runtime_libs: Box::new(BundledRuntime::new()),
            sink: Arc::new(DiagnosticSink::new()),
            llvm_available: crate::LLVM_AVAILABLE,
        }
    }
}

/// One compilation: all tables, queues, caches, and collaborator handles.
///
/// Field order is destruction order: the linker goes first (it reads from
/// the module during flush), the module second, then the stage1 artifact
/// lock, then every table holding artifact locks, then the directories.
impl std::fmt::Debug for Compilation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compilation").finish_non_exhaustive()
    }
}

pub struct Compilation {
    linker: Box<dyn Linker>,
    module: Box<dyn Module>,
    stage1_lock: Option<ArtifactLock>,
    stage1: Option<Box<dyn Stage1Backend>>,
    runtime_libs: Box<dyn RuntimeLibs>,
    sink: Arc<DiagnosticSink>,

    options: CompilationOptions,
    config: ResolvedConfig,
    llvm_available: bool,

    c_objects: Vec<CObject>,
    failed_c_objects: HashMap<CObjectId, Diagnostic>,
    crt_files: BTreeMap<String, CrtFile>,
    libunwind_static_lib: Option<CrtFile>,
    libcxx_static_lib: Option<CrtFile>,
    libcxxabi_static_lib: Option<CrtFile>,
    compiler_rt_static_lib: Option<CrtFile>,
    libc_static_lib: Option<CrtFile>,

    work_queue: VecDeque<Job>,
    system_libs: Vec<String>,
    link_error_flags: LinkErrorFlags,

    lib_dir: Directory,
    local_cache: Cache,
    global_cache: Cache,
    artifact_dir: Directory,
    output_dir: Option<Directory>,
}

impl Compilation {
    /// Resolves the configuration, sets up caches and tables, and enqueues
    /// the initial jobs. Inconsistent options fail here.
    pub fn create(create: CreateOptions) -> Result<Self, DriverError> {
        let config = resolve(&create.options, create.llvm_available)?;

        let local_cache = Cache::new(create.local_cache_dir, crate::VERSION);
        let global_cache = Cache::new(create.global_cache_dir, crate::VERSION);

        let artifact_dir = local_cache
            .dir()
            .sub("artifact")
            .sub(&create.options.root_name);
        artifact_dir
            .ensure_exists()
            .map_err(|e| DriverError::io(artifact_dir.path(), e))?;

        let output_dir = create
            .options
            .emit_bin
            .as_ref()
            .and_then(|loc| loc.directory.clone());
        if let Some(dir) = &output_dir {
            dir.ensure_exists()
                .map_err(|e| DriverError::io(dir.path(), e))?;
        }

        let c_objects: Vec<CObject> = create
            .options
            .c_source_files
            .iter()
            .cloned()
            .map(CObject::new)
            .collect();
        let system_libs = create.options.system_libs.clone();

        let mut comp = Self {
            linker: create.linker,
            module: create.module,
            stage1_lock: None,
            stage1: create.stage1,
            runtime_libs: create.runtime_libs,
            sink: create.sink,
            options: create.options,
            config,
            llvm_available: create.llvm_available,
            c_objects,
            failed_c_objects: HashMap::new(),
            crt_files: BTreeMap::new(),
            libunwind_static_lib: None,
            libcxx_static_lib: None,
            libcxxabi_static_lib: None,
            compiler_rt_static_lib: None,
            libc_static_lib: None,
            work_queue: VecDeque::new(),
            system_libs,
            link_error_flags: LinkErrorFlags::default(),
            lib_dir: create.lib_dir,
            local_cache,
            global_cache,
            artifact_dir,
            output_dir,
        };
        comp.enqueue_initial_jobs();
        Ok(comp)
    }

    fn enqueue_initial_jobs(&mut self) {
        let target = self.options.target;

        if self.options.have_root_module {
            self.work_queue.push_back(Job::GenerateBuiltinSource);
        }

        let wants_crt = self.config.link_libc
            && self.config.is_exe_or_dyn_lib
            && !self.options.is_compiler_rt_or_libc;
        if wants_crt && target.can_build_libc_from_source() {
            if target.is_musl() {
                self.work_queue.push_back(Job::MuslCrtFile(MuslFile::Crt1O));
                self.work_queue.push_back(Job::MuslCrtFile(MuslFile::Scrt1O));
                self.work_queue.push_back(Job::MuslCrtFile(MuslFile::LibcA));
            } else if target.is_glibc() {
                self.work_queue
                    .push_back(Job::GlibcCrtFile(GlibcFile::Scrt1O));
                self.work_queue
                    .push_back(Job::GlibcCrtFile(GlibcFile::CrtiO));
                self.work_queue
                    .push_back(Job::GlibcCrtFile(GlibcFile::CrtnO));
                self.work_queue.push_back(Job::GlibcSharedObjects);
                self.work_queue
                    .push_back(Job::GlibcCrtFile(GlibcFile::LibcNonsharedA));
            } else if target.is_mingw() {
                let entry = if self.config.is_dyn_lib {
                    MingwFile::Dllcrt2O
                } else {
                    MingwFile::Crt2O
                };
                self.work_queue.push_back(Job::MingwCrtFile(entry));
                self.work_queue
                    .push_back(Job::MingwCrtFile(MingwFile::Libmingw32A));
            }
        }
        if self.config.link_libc && target.os == Os::Wasi && !self.options.is_compiler_rt_or_libc
        {
            self.work_queue.push_back(Job::BundledLibc);
        }
        if self.options.link_libcpp
            && self.config.is_exe_or_dyn_lib
            && !self.options.is_compiler_rt_or_libc
        {
            self.work_queue.push_back(Job::Libcxx);
            self.work_queue.push_back(Job::Libcxxabi);
        }
        if wants_crt && target.can_build_libc_from_source() {
            self.work_queue.push_back(Job::Libunwind);
        }
        if self.options.have_root_module
            && self.config.is_exe_or_dyn_lib
            && !self.options.is_stage1
            && !self.options.is_compiler_rt_or_libc
        {
            // Stage1 folds compiler-rt into its own object.
            self.work_queue.push_back(Job::CompilerRt);
        }
        if self.options.have_root_module && self.options.is_stage1 {
            self.work_queue.push_back(Job::Stage1);
        }
    }

    /// Runs one incremental update: enqueue per-input jobs, drain the
    /// queue, process deletions, then flush the linker unless errors were
    /// recorded.
    pub fn update(&mut self) -> Result<(), DriverError> {
        for id in 0..self.c_objects.len() {
            self.work_queue.push_back(Job::CObject(id));
        }

        if self.options.have_root_module && !self.options.is_stage1 {
            self.module.bump_generation();
            self.module.unload_root_source();
            match self.module.analyze_root() {
                Ok(jobs) => {
                    for job in jobs {
                        self.work_queue.push_back(match job {
                            ModuleJob::Analyze(d) => Job::AnalyzeDecl(d),
                            ModuleJob::Codegen(d) => Job::CodegenDecl(d),
                            ModuleJob::UpdateLineNumber(d) => Job::UpdateLineNumber(d),
                        });
                    }
                }
                // Errors are already recorded on the module.
                Err(ModuleError::AnalysisFail) => {}
                Err(ModuleError::Retryable(msg)) => {
                    self.sink
                        .emit(Diagnostic::warning(format!("root analysis: {msg}")));
                }
            }
        }

        while let Some(job) = self.work_queue.pop_front() {
            self.process_job(job)?;
        }

        if self.options.have_root_module && !self.options.is_stage1 {
            for decl in self.module.take_deletion_candidates() {
                if self.module.dependant_count(decl) == 0 {
                    self.module.delete_decl(decl);
                } else {
                    self.module.clear_deletion_flag(decl);
                }
            }
        }

        if self.total_error_count() > 0 {
            // Errors are reported separately; stale link flags must not
            // leak into them.
            self.link_error_flags = LinkErrorFlags::default();
            self.linker.clear_error_flags();
            return Ok(());
        }

        let ctx = self.link_context();
        self.linker.flush(&ctx)?;
        self.link_error_flags = self.linker.error_flags();

        if self.total_error_count() == 0 && !self.options.keep_source_files_loaded {
            self.module.unload_root_source();
        }
        Ok(())
    }

    fn process_job(&mut self, job: Job) -> Result<(), DriverError> {
        match job {
            Job::CodegenDecl(decl) => match self.module.decl_state(decl) {
                DeclState::Complete | DeclState::CodegenFailureRetryable => {
                    if self.module.is_queued_function(decl) {
                        match self.module.analyze_body_and_liveness(decl) {
                            Ok(()) => {}
                            Err(ModuleError::AnalysisFail) => {
                                self.module
                                    .set_decl_state(decl, DeclState::DependencyFailure);
                                return Ok(());
                            }
                            Err(ModuleError::Retryable(msg)) => {
                                self.module.record_retryable_failure(
                                    decl,
                                    format!("unable to codegen: {msg}"),
                                );
                                return Ok(());
                            }
                        }
                    }
                    if let Err(msg) = self.linker.update_decl(decl) {
                        self.module
                            .record_retryable_failure(decl, format!("unable to codegen: {msg}"));
                    }
                    Ok(())
                }
                state @ (DeclState::Unreferenced
                | DeclState::InProgress
                | DeclState::Outdated) => Err(InternalError::new(format!(
                    "codegen job for declaration in state {state:?}"
                ))
                .into()),
                DeclState::SemaFailure
                | DeclState::SemaFailureRetryable
                | DeclState::CodegenFailure
                | DeclState::DependencyFailure => Ok(()),
            },
            Job::AnalyzeDecl(decl) => {
                match self.module.ensure_decl_analyzed(decl) {
                    Ok(()) | Err(ModuleError::AnalysisFail) => {}
                    Err(ModuleError::Retryable(msg)) => {
                        self.module.record_retryable_failure(decl, msg);
                    }
                }
                Ok(())
            }
            Job::UpdateLineNumber(decl) => {
                if let Err(msg) = self.linker.update_decl_line_number(decl) {
                    self.module.record_retryable_failure(decl, msg);
                }
                Ok(())
            }
            Job::CObject(id) => match self.update_c_object(id) {
                Ok(()) => Ok(()),
                Err(err @ DriverError::EarlyExit(_)) => Err(err),
                Err(err) => {
                    let src_path = self.c_objects[id].src.src_path.clone();
                    self.record_c_object_failure(
                        id,
                        &src_path,
                        format!("unable to build C object: {err}"),
                    );
                    Ok(())
                }
            },
            Job::GlibcCrtFile(which) => {
                let spec = self.runtime_libs.glibc_crt_file(which);
                self.build_crt_file("glibc", spec)
            }
            Job::GlibcSharedObjects => {
                for spec in self.runtime_libs.glibc_shared_objects() {
                    self.build_crt_file("glibc shared objects", spec)?;
                }
                Ok(())
            }
            Job::MuslCrtFile(which) => {
                let spec = self.runtime_libs.musl_crt_file(which);
                self.build_crt_file("musl", spec)
            }
            Job::MingwCrtFile(which) => {
                let spec = self.runtime_libs.mingw_crt_file(which);
                self.build_crt_file("mingw-w64", spec)
            }
            Job::Libunwind => {
                let spec = self.runtime_libs.libunwind();
                let file = self.build_runtime_source("libunwind", spec, OutputMode::Obj)?;
                self.libunwind_static_lib = Some(file);
                Ok(())
            }
            Job::Libcxx => {
                let spec = self.runtime_libs.libcxx();
                let file = self.build_runtime_source("libcxx", spec, OutputMode::Obj)?;
                self.libcxx_static_lib = Some(file);
                Ok(())
            }
            Job::Libcxxabi => {
                let spec = self.runtime_libs.libcxxabi();
                let file = self.build_runtime_source("libcxxabi", spec, OutputMode::Obj)?;
                self.libcxxabi_static_lib = Some(file);
                Ok(())
            }
            Job::CompilerRt => {
                let spec = self.runtime_libs.compiler_rt();
                let mode = self.native_runtime_output_mode();
                let file = self.build_runtime_source("compiler_rt", spec, mode)?;
                self.compiler_rt_static_lib = Some(file);
                Ok(())
            }
            Job::BundledLibc => {
                let spec = self.runtime_libs.bundled_libc();
                let mode = self.native_runtime_output_mode();
                let file = self.build_runtime_source("c", spec, mode)?;
                self.libc_static_lib = Some(file);
                Ok(())
            }
            Job::WindowsImportLib(index) => self.build_import_lib(index),
            Job::GenerateBuiltinSource => {
                let text = generate_builtin_source(&self.options, &self.config);
                let path = self.artifact_dir.join(BUILTIN_BASENAME);
                std::fs::write(&path, text).map_err(|e| DriverError::io(path, e))
            }
            Job::Stage1 => self.run_stage1(),
        }
    }

    /// Output mode for native-language runtime sub-compilations.
    fn native_runtime_output_mode(&self) -> OutputMode {
        if self.options.target.default_object_format() == kiln_target::ObjectFormat::Wasm {
            OutputMode::Obj
        } else {
            OutputMode::Lib
        }
    }

    /// Builds one CRT file through a sub-compilation and records it under
    /// its basename.
    fn build_crt_file(&mut self, lib: &str, spec: CrtSourceSpec) -> Result<(), DriverError> {
        let basename = spec.basename.clone();
        let file = self.build_runtime_source(lib, spec, OutputMode::Obj)?;
        self.crt_files.insert(basename, file);
        Ok(())
    }

    /// Spawns a child compilation for one bundled runtime source and
    /// captures its single output.
    ///
    /// Any error in the child is fatal for the parent: these builds are
    /// expected to succeed for supported targets.
    fn build_runtime_source(
        &mut self,
        lib: &str,
        spec: CrtSourceSpec,
        output_mode: OutputMode,
    ) -> Result<CrtFile, DriverError> {
        let stem = spec
            .basename
            .split('.')
            .next()
            .unwrap_or(&spec.basename)
            .to_string();
        let mut child_options = CompilationOptions::new(stem, self.options.target);
        child_options.output_mode = output_mode;
        child_options.optimize_mode = self.options.optimize_mode;
        child_options.c_source_files = vec![CSourceFile {
            src_path: self.lib_dir.join(&spec.src_rel),
            extra_flags: spec.extra_flags,
        }];
        child_options.link_mode = Some(LinkMode::Static);
        child_options.function_sections = true;
        child_options.want_sanitize_c = Some(false);
        child_options.want_stack_check = Some(false);
        child_options.want_valgrind = Some(false);
        child_options.is_compiler_rt_or_libc = true;
        child_options.parent_compilation_link_libc = self.config.link_libc;
        child_options.clang_path = self.options.clang_path.clone();
        child_options.libc_include_dirs = self.options.libc_include_dirs.clone();
        child_options.verbose_cc = self.options.verbose_cc;

        let child_create = CreateOptions {
            options: child_options,
            lib_dir: self.lib_dir.clone(),
            // Sub-compilations cache globally: the artifacts are
            // per-target, not per-project.
            local_cache_dir: self.global_cache.dir().clone(),
            global_cache_dir: self.global_cache.dir().clone(),
            module: Box::new(NullModule::new()),
            linker: Box::new(SystemLinker::new(None, None)),
            stage1: None,
            runtime_libs: Box::new(BundledRuntime::new()),
            sink: Arc::clone(&self.sink),
            llvm_available: self.llvm_available,
        };

        let mut child = Compilation::create(child_create)?;
        child.update()?;
        if child.total_error_count() > 0 {
            return Err(DriverError::RuntimeLibBuildFailed {
                lib: lib.to_string(),
                errors: child.aggregate_errors(),
            });
        }
        child.take_single_output().ok_or_else(|| {
            InternalError::new(format!("sub-compilation for {lib} produced no output")).into()
        })
    }

    /// Takes ownership of the compilation's single successful C object.
    pub(crate) fn take_single_output(&mut self) -> Option<CrtFile> {
        for obj in &mut self.c_objects {
            if matches!(obj.status, CObjectStatus::Success { .. }) {
                let CObjectStatus::Success { object_path, lock } =
                    std::mem::replace(&mut obj.status, CObjectStatus::New)
                else {
                    unreachable!();
                };
                return Some(CrtFile {
                    full_object_path: object_path,
                    lock,
                });
            }
        }
        None
    }

    /// Generates (or reuses) the import library for `system_libs[index]`.
    fn build_import_lib(&mut self, index: usize) -> Result<(), DriverError> {
        let lib = self.system_libs.get(index).cloned().ok_or_else(|| {
            InternalError::new(format!("import-lib job for missing system lib {index}"))
        })?;
        let basename = format!("{lib}.lib");

        let cache = self.global_cache.clone();
        let mut manifest = cache.obtain();
        manifest.add_str("import-lib");
        manifest.add_str(&lib);
        manifest.add_str(&self.options.target.to_string());

        if !manifest.hit()? {
            let tmp = cache.tmp_path(&basename)?;
            self.runtime_libs
                .generate_import_lib(&lib, &self.options.target, &tmp)?;
            let digest = manifest.final_digest();
            cache.rename_into_cache(&tmp, &digest, &basename)?;
            if let Err(e) = manifest.write_manifest() {
                self.sink.emit(Diagnostic::warning(format!(
                    "unable to write cache manifest: {e}"
                )));
            }
        }

        let path = cache.artifact_path(&manifest.final_digest(), &basename);
        let lock = manifest
            .take_lock()
            .ok_or_else(|| InternalError::new("import-lib manifest has no lock"))?;
        self.crt_files.insert(
            basename,
            CrtFile {
                full_object_path: path,
                lock,
            },
        );
        Ok(())
    }

    /// Records a link library discovered during code generation.
    ///
    /// New libraries on Windows targets enqueue an import-library job whose
    /// index refers into the (append-only) system-libs sequence.
    pub fn add_link_lib(&mut self, name: &str) -> Result<(), DriverError> {
        if name.is_empty()
            || name
                .chars()
                .any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(DriverError::InvalidLinkLibName {
                name: name.to_string(),
            });
        }
        if !self.system_libs.iter().any(|l| l == name) {
            self.system_libs.push(name.to_string());
            if self.options.target.os == Os::Windows {
                let index = self.system_libs.len() - 1;
                self.work_queue.push_back(Job::WindowsImportLib(index));
            }
        }
        Ok(())
    }

    /// Folds the decisions every artifact depends on into a manifest.
    pub(crate) fn add_base_cache_inputs(&self, manifest: &mut Manifest<'_>) {
        manifest.add_str(&self.lib_dir.path().display().to_string());
        manifest.add_str(self.options.optimize_mode.name());
        manifest.add_str(&self.options.target.to_string());
        manifest.add_str(&self.options.cpu_model.name);
        for feature in self.options.cpu_features.iter() {
            manifest.add_str(&feature.name);
            manifest.add_bool(feature.enabled);
        }
        manifest.add_str(&self.config.object_format.to_string());
        manifest.add_bool(self.config.pic);
        manifest.add_bool(self.config.stack_check);
        manifest.add_bool(self.config.link_mode == LinkMode::Dynamic);
        manifest.add_bool(self.options.function_sections);
        manifest.add_bool(self.config.strip);
        manifest.add_bool(self.config.link_libc);
        manifest.add_bool(self.options.link_libcpp);
        manifest.add_int(self.options.output_mode as u64);
        manifest.add_str(&format!("{:?}", self.config.code_model));
        manifest.add_bool(self.options.emit_bin.is_some());
    }

    pub(crate) fn add_stage1_inputs(&self, manifest: &mut Manifest<'_>) {
        manifest.add_bool(self.config.valgrind);
        manifest.add_bool(self.config.single_threaded);
        let range = self
            .options
            .os_version_range
            .unwrap_or_else(|| kiln_target::OsVersionRange::default_for_target(&self.options.target));
        manifest.add_str(&format!("{range:?}"));
        manifest.add_bool(self.config.dll_export_fns);
        manifest.add_bool(self.options.function_sections);
        manifest.add_bool(self.options.is_test);
        for emit in [
            &self.options.emit_bin,
            &self.options.emit_h,
            &self.options.emit_asm,
            &self.options.emit_llvm_ir,
            &self.options.emit_analysis,
            &self.options.emit_docs,
        ] {
            manifest.add_bool(emit.is_some());
        }
    }

    pub(crate) fn stage1_context(&self, root_src: &std::path::Path) -> crate::stage1::Stage1Context {
        crate::stage1::Stage1Context {
            root_name: self.options.root_name.clone(),
            root_source_path: root_src.to_path_buf(),
            target: self.options.target,
            optimize_mode: self.options.optimize_mode,
            artifact_dir: self.artifact_dir.path().to_path_buf(),
            emit_bin_path: self.bin_file_path(),
            emit_h: self.options.emit_h.is_some(),
            emit_asm: self.options.emit_asm.is_some(),
            emit_llvm_ir: self.options.emit_llvm_ir.is_some(),
            emit_analysis: self.options.emit_analysis.is_some(),
            emit_docs: self.options.emit_docs.is_some(),
            is_test: self.options.is_test,
            single_threaded: self.config.single_threaded,
            function_sections: self.options.function_sections,
            dll_export_fns: self.config.dll_export_fns,
        }
    }

    fn link_context(&self) -> LinkContext {
        let mut objects = Vec::new();
        for obj in &self.c_objects {
            if let CObjectStatus::Success { object_path, .. } = &obj.status {
                objects.push(object_path.clone());
            }
        }
        objects.extend(self.options.link_objects.iter().cloned());

        let mut crt_files = Vec::new();
        crt_files.extend(self.crt_files.values().map(|f| f.full_object_path.clone()));
        for lib in [
            &self.compiler_rt_static_lib,
            &self.libunwind_static_lib,
            &self.libcxxabi_static_lib,
            &self.libcxx_static_lib,
            &self.libc_static_lib,
        ]
        .into_iter()
        .flatten()
        {
            crt_files.push(lib.full_object_path.clone());
        }

        LinkContext {
            output_mode: self.options.output_mode,
            link_mode: self.config.link_mode,
            objects,
            crt_files,
            system_libs: self.system_libs.clone(),
            lib_dirs: self.options.lib_dirs.clone(),
            out_path: self.bin_file_path(),
        }
    }

    /// Where the emitted binary goes, if a binary was requested.
    pub fn bin_file_path(&self) -> Option<PathBuf> {
        self.options.emit_bin.as_ref().map(|loc| match &loc.directory {
            Some(dir) => dir.join(&loc.basename),
            None => self.artifact_dir.join(&loc.basename),
        })
    }

    /// Total number of reportable errors.
    ///
    /// Link error flags count only when nothing else went wrong: a missing
    /// entry point is noise next to the error that caused it.
    pub fn total_error_count(&self) -> usize {
        let base = self.failed_c_objects.len() + self.module.error_count();
        if base == 0 {
            self.link_error_flags.count()
        } else {
            base
        }
    }

    /// Collects every reportable error into a single list.
    pub fn aggregate_errors(&self) -> Vec<Diagnostic> {
        let mut errors: Vec<Diagnostic> = Vec::new();
        let mut failed: Vec<_> = self.failed_c_objects.iter().collect();
        failed.sort_by_key(|(id, _)| **id);
        errors.extend(failed.into_iter().map(|(_, d)| d.clone()));
        errors.extend(self.module.errors());
        if errors.is_empty() {
            if self.link_error_flags.no_entry_point_found {
                errors.push(Diagnostic::error("no entry point found"));
            }
            if self.link_error_flags.missing_libc {
                errors.push(Diagnostic::error(
                    "an input requires libc but the image does not link it",
                ));
            }
        }
        errors
    }

    // --- accessors used across the driver and by front-ends ---

    /// The user options this compilation was created with.
    pub fn options(&self) -> &CompilationOptions {
        &self.options
    }

    /// The resolved configuration.
    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// The C-object slots, in input order.
    pub fn c_objects(&self) -> &[CObject] {
        &self.c_objects
    }

    /// The built CRT files, keyed by basename.
    pub fn crt_files(&self) -> &BTreeMap<String, CrtFile> {
        &self.crt_files
    }

    /// The libunwind runtime, once built.
    pub fn libunwind_static_lib(&self) -> Option<&CrtFile> {
        self.libunwind_static_lib.as_ref()
    }

    /// The compiler-rt runtime, once built.
    pub fn compiler_rt_static_lib(&self) -> Option<&CrtFile> {
        self.compiler_rt_static_lib.as_ref()
    }

    /// The C++ runtime, once built.
    pub fn libcxx_static_lib(&self) -> Option<&CrtFile> {
        self.libcxx_static_lib.as_ref()
    }

    /// The current system libraries, in insertion order.
    pub fn system_libs(&self) -> &[String] {
        &self.system_libs
    }

    /// The module artifact directory (`builtin.kn`, `stage1.id`, `libs.txt`).
    pub fn artifact_dir(&self) -> &Directory {
        &self.artifact_dir
    }

    /// The per-project cache.
    pub fn local_cache(&self) -> &Cache {
        &self.local_cache
    }

    /// The owned output directory handle, when the binary goes to an
    /// explicit directory.
    pub fn output_dir(&self) -> Option<&Directory> {
        self.output_dir.as_ref()
    }

    /// Kiln's bundled `lib/` directory.
    pub fn lib_dir(&self) -> &Directory {
        &self.lib_dir
    }

    /// The diagnostic sink warnings are emitted into.
    pub fn sink(&self) -> &DiagnosticSink {
        &self.sink
    }

    /// The language module collaborator.
    pub fn module_mut(&mut self) -> &mut dyn Module {
        self.module.as_mut()
    }

    /// Link error flags observed by the last flush.
    pub fn link_error_flags(&self) -> LinkErrorFlags {
        self.link_error_flags
    }

    pub(crate) fn stage1_backend_mut(&mut self) -> Option<&mut Box<dyn Stage1Backend>> {
        self.stage1.as_mut()
    }

    pub(crate) fn set_stage1_lock(&mut self, lock: Option<ArtifactLock>) {
        self.stage1_lock = lock;
    }

    pub(crate) fn clear_c_object(&mut self, id: CObjectId) {
        self.c_objects[id].clear_status();
        self.failed_c_objects.remove(&id);
    }

    pub(crate) fn set_c_object_success(
        &mut self,
        id: CObjectId,
        object_path: PathBuf,
        lock: ArtifactLock,
    ) {
        self.c_objects[id].status = CObjectStatus::Success { object_path, lock };
    }

    pub(crate) fn insert_c_object_failure(&mut self, id: CObjectId, diag: Diagnostic) {
        self.failed_c_objects.insert(id, diag);
        self.c_objects[id].status = CObjectStatus::Failure;
    }

    /// Whether the stage1 artifact lock is currently held.
    pub fn stage1_lock_held(&self) -> bool {
        self.stage1_lock.is_some()
    }

    #[cfg(test)]
    pub(crate) fn queued_jobs(&self) -> Vec<Job> {
        self.work_queue.iter().cloned().collect()
    }
}
