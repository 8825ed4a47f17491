//! Construction of the child C compiler's argument list.
//!
//! `add_cc_args` is a pure function over the resolved config and the
//! classified input kind. The flag order is part of the driver's contract:
//! the cache manifest hashes `clang_argv` and config decisions separately,
//! but tooling (and people) diff these command lines, so they must be
//! reproducible.

use kiln_config::{CompilationOptions, OptimizeMode};
use kiln_config::resolve::ResolvedConfig;
use kiln_target::{Arch, Os};
use std::path::Path;

/// The classified kind of a C-family input file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CSourceKind {
    /// A C translation unit.
    C,
    /// A C++ translation unit.
    Cpp,
    /// A header compiled standalone (precompiled header input).
    Header,
    /// An assembly file.
    Assembly,
    /// Anything else handed to the child compiler untouched.
    Other,
}

impl CSourceKind {
    /// Classifies a file by extension.
    pub fn classify(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
        {
            "c" => CSourceKind::C,
            "C" | "cc" | "cpp" | "cxx" | "c++" => CSourceKind::Cpp,
            "h" | "hpp" | "hh" => CSourceKind::Header,
            "s" | "S" => CSourceKind::Assembly,
            _ => CSourceKind::Other,
        }
    }

    /// True for inputs the C front-end preprocesses and parses.
    pub fn is_c_family(self) -> bool {
        matches!(self, CSourceKind::C | CSourceKind::Cpp | CSourceKind::Header)
    }
}

/// Appends the compiler arguments for one input to `argv`.
///
/// `dep_file_path` requests `-MD -MV -MF` dependency tracking.
pub fn add_cc_args(
    options: &CompilationOptions,
    config: &ResolvedConfig,
    lib_dir: &Path,
    kind: CSourceKind,
    dep_file_path: Option<&Path>,
    argv: &mut Vec<String>,
) {
    let target = &options.target;

    if kind == CSourceKind::Cpp {
        argv.push("-nostdinc++".to_string());
    }
    if !options.clang_passthrough_mode {
        argv.push("-fno-caret-diagnostics".to_string());
    }
    if options.function_sections {
        argv.push("-ffunction-sections".to_string());
    }
    for dir in &options.framework_dirs {
        argv.push("-iframework".to_string());
        argv.push(dir.display().to_string());
    }
    if options.link_libcpp {
        argv.push("-isystem".to_string());
        argv.push(lib_dir.join("libcxx").join("include").display().to_string());
        argv.push("-isystem".to_string());
        argv.push(
            lib_dir
                .join("libcxxabi")
                .join("include")
                .display()
                .to_string(),
        );
        if target.is_musl() {
            argv.push("-D_LIBCPP_HAS_MUSL_LIBC".to_string());
        }
        argv.push("-D_LIBCPP_DISABLE_VISIBILITY_ANNOTATIONS".to_string());
        argv.push("-D_LIBCXXABI_DISABLE_VISIBILITY_ANNOTATIONS".to_string());
    }

    argv.push("-target".to_string());
    argv.push(target.llvm_triple());

    if kind.is_c_family() {
        argv.push("-nostdinc".to_string());
        argv.push("-fno-spell-checking".to_string());

        argv.push("-isystem".to_string());
        argv.push(lib_dir.join("include").display().to_string());
        for dir in &options.libc_include_dirs {
            argv.push("-isystem".to_string());
            argv.push(dir.display().to_string());
        }

        if let Some(cpu) = &options.cpu_model.llvm_name {
            argv.push("-Xclang".to_string());
            argv.push("-target-cpu".to_string());
            argv.push("-Xclang".to_string());
            argv.push(cpu.clone());
        }
        for feature in options.cpu_features.iter() {
            if let Some(llvm_name) = &feature.llvm_name {
                let sign = if feature.enabled { '+' } else { '-' };
                argv.push("-Xclang".to_string());
                argv.push("-target-feature".to_string());
                argv.push("-Xclang".to_string());
                argv.push(format!("{sign}{llvm_name}"));
            }
        }
        if let Some(model) = config.code_model.clang_name() {
            argv.push(format!("-mcmodel={model}"));
        }
        if target.is_mingw() {
            argv.push("-Wno-pragma-pack".to_string());
        }
        if !config.strip {
            argv.push("-g".to_string());
        }
        let want_frame_pointer = matches!(
            options.optimize_mode,
            OptimizeMode::Debug | OptimizeMode::ReleaseSafe
        ) && !config.strip;
        if want_frame_pointer {
            argv.push("-fno-omit-frame-pointer".to_string());
        } else {
            argv.push("-fomit-frame-pointer".to_string());
        }
        if config.sanitize_c {
            argv.push("-fsanitize=undefined".to_string());
            argv.push("-fsanitize-trap=undefined".to_string());
        }
        match options.optimize_mode {
            OptimizeMode::Debug => {
                argv.push("-D_DEBUG".to_string());
                argv.push("-Og".to_string());
                push_stack_protector(argv, config.link_libc);
            }
            OptimizeMode::ReleaseSafe => {
                argv.push("-O2".to_string());
                argv.push("-D_FORTIFY_SOURCE=2".to_string());
                push_stack_protector(argv, config.link_libc);
            }
            OptimizeMode::ReleaseFast => {
                argv.push("-DNDEBUG".to_string());
                argv.push("-O2".to_string());
                argv.push("-fno-stack-protector".to_string());
            }
            OptimizeMode::ReleaseSmall => {
                argv.push("-DNDEBUG".to_string());
                argv.push("-Os".to_string());
                argv.push("-fno-stack-protector".to_string());
            }
        }
        if target.supports_pic() && config.pic {
            argv.push("-fPIC".to_string());
        }
    }

    if let Some(dep_path) = dep_file_path {
        argv.push("-MD".to_string());
        argv.push("-MV".to_string());
        argv.push("-MF".to_string());
        argv.push(dep_path.display().to_string());
    }

    if target.arch == Arch::Riscv64 {
        if options.cpu_features.is_enabled("relax") {
            argv.push("-mrelax".to_string());
        } else {
            argv.push("-mno-relax".to_string());
        }
    }
    if target.os == Os::Freestanding {
        argv.push("-ffreestanding".to_string());
    }

    argv.extend(options.clang_argv.iter().cloned());
}

fn push_stack_protector(argv: &mut Vec<String>, link_libc: bool) {
    if link_libc {
        argv.push("-fstack-protector-strong".to_string());
        argv.push("--param".to_string());
        argv.push("ssp-buffer-size=4".to_string());
    } else {
        argv.push("-fno-stack-protector".to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_config::{resolve, CompilationOptions};
    use kiln_target::Triple;
    use std::path::PathBuf;

    fn build_args(mutate: impl FnOnce(&mut CompilationOptions)) -> Vec<String> {
        build_args_for("x86_64-linux-musl", CSourceKind::C, mutate)
    }

    fn build_args_for(
        target: &str,
        kind: CSourceKind,
        mutate: impl FnOnce(&mut CompilationOptions),
    ) -> Vec<String> {
        let target: Triple = target.parse().unwrap();
        let mut options = CompilationOptions::new("demo", target);
        mutate(&mut options);
        let config = resolve(&options, true).unwrap();
        let mut argv = Vec::new();
        add_cc_args(
            &options,
            &config,
            Path::new("/kiln/lib"),
            kind,
            None,
            &mut argv,
        );
        argv
    }

    #[test]
    fn classify_extensions() {
        assert_eq!(CSourceKind::classify(Path::new("a.c")), CSourceKind::C);
        assert_eq!(CSourceKind::classify(Path::new("a.cpp")), CSourceKind::Cpp);
        assert_eq!(CSourceKind::classify(Path::new("a.cc")), CSourceKind::Cpp);
        assert_eq!(CSourceKind::classify(Path::new("a.h")), CSourceKind::Header);
        assert_eq!(
            CSourceKind::classify(Path::new("a.S")),
            CSourceKind::Assembly
        );
        assert_eq!(CSourceKind::classify(Path::new("a.ll")), CSourceKind::Other);
    }

    #[test]
    fn debug_c_baseline_flags() {
        let argv = build_args(|_| {});
        let joined = argv.join(" ");
        assert!(argv.contains(&"-fno-caret-diagnostics".to_string()));
        assert!(joined.contains("-target x86_64-unknown-linux-musl"));
        assert!(argv.contains(&"-nostdinc".to_string()));
        assert!(argv.contains(&"-fno-spell-checking".to_string()));
        assert!(joined.contains("-isystem /kiln/lib/include"));
        assert!(argv.contains(&"-g".to_string()));
        assert!(argv.contains(&"-fno-omit-frame-pointer".to_string()));
        assert!(argv.contains(&"-fsanitize=undefined".to_string()));
        assert!(argv.contains(&"-fsanitize-trap=undefined".to_string()));
        assert!(argv.contains(&"-D_DEBUG".to_string()));
        assert!(argv.contains(&"-Og".to_string()));
        // No libc: no stack protector.
        assert!(argv.contains(&"-fno-stack-protector".to_string()));
        // musl without dynamic linking: no PIC.
        assert!(!argv.contains(&"-fPIC".to_string()));
    }

    #[test]
    fn cpp_input_gets_nostdincxx_first() {
        let argv = build_args_for("x86_64-linux-musl", CSourceKind::Cpp, |_| {});
        assert_eq!(argv[0], "-nostdinc++");
    }

    #[test]
    fn libcpp_include_dirs_and_defines() {
        let argv = build_args_for("x86_64-linux-musl", CSourceKind::Cpp, |o| {
            o.link_libcpp = true;
        });
        let joined = argv.join(" ");
        assert!(joined.contains("-isystem /kiln/lib/libcxx/include"));
        assert!(joined.contains("-isystem /kiln/lib/libcxxabi/include"));
        assert!(argv.contains(&"-D_LIBCPP_HAS_MUSL_LIBC".to_string()));
        assert!(argv.contains(&"-D_LIBCPP_DISABLE_VISIBILITY_ANNOTATIONS".to_string()));
        assert!(argv.contains(&"-D_LIBCXXABI_DISABLE_VISIBILITY_ANNOTATIONS".to_string()));
    }

    #[test]
    fn musl_define_only_for_musl() {
        let argv = build_args_for("x86_64-linux-gnu", CSourceKind::Cpp, |o| {
            o.link_libcpp = true;
        });
        assert!(!argv.contains(&"-D_LIBCPP_HAS_MUSL_LIBC".to_string()));
    }

    #[test]
    fn stack_protector_with_libc() {
        let argv = build_args(|o| o.link_libc = true);
        let joined = argv.join(" ");
        assert!(joined.contains("-fstack-protector-strong --param ssp-buffer-size=4"));
    }

    #[test]
    fn release_fast_flags() {
        let argv = build_args(|o| o.optimize_mode = OptimizeMode::ReleaseFast);
        assert!(argv.contains(&"-DNDEBUG".to_string()));
        assert!(argv.contains(&"-O2".to_string()));
        assert!(argv.contains(&"-fno-stack-protector".to_string()));
        assert!(!argv.contains(&"-fsanitize=undefined".to_string()));
        assert!(argv.contains(&"-fomit-frame-pointer".to_string()));
    }

    #[test]
    fn release_safe_fortifies() {
        let argv = build_args(|o| {
            o.optimize_mode = OptimizeMode::ReleaseSafe;
            o.link_libc = true;
        });
        assert!(argv.contains(&"-D_FORTIFY_SOURCE=2".to_string()));
        assert!(argv.contains(&"-O2".to_string()));
    }

    #[test]
    fn release_small_uses_os() {
        let argv = build_args(|o| o.optimize_mode = OptimizeMode::ReleaseSmall);
        assert!(argv.contains(&"-Os".to_string()));
    }

    #[test]
    fn strip_drops_debug_info() {
        let argv = build_args(|o| o.strip = true);
        assert!(!argv.contains(&"-g".to_string()));
        assert!(argv.contains(&"-fomit-frame-pointer".to_string()));
    }

    #[test]
    fn pic_emitted_when_enabled() {
        let argv = build_args(|o| o.want_pic = Some(true));
        assert!(argv.contains(&"-fPIC".to_string()));
    }

    #[test]
    fn windows_gnu_quirks() {
        let argv = build_args_for("x86_64-windows-gnu", CSourceKind::C, |_| {});
        assert!(argv.contains(&"-Wno-pragma-pack".to_string()));
        // Windows never takes -fPIC even though PIC is mandatory there.
        assert!(!argv.contains(&"-fPIC".to_string()));
    }

    #[test]
    fn dep_file_flags_in_order() {
        let target: Triple = "x86_64-linux-musl".parse().unwrap();
        let options = CompilationOptions::new("demo", target);
        let config = resolve(&options, true).unwrap();
        let mut argv = Vec::new();
        add_cc_args(
            &options,
            &config,
            Path::new("/kiln/lib"),
            CSourceKind::C,
            Some(Path::new("/tmp/foo.d")),
            &mut argv,
        );
        let pos = argv.iter().position(|a| a == "-MD").unwrap();
        assert_eq!(&argv[pos..pos + 4], &["-MD", "-MV", "-MF", "/tmp/foo.d"]);
    }

    #[test]
    fn riscv_relax_flag() {
        let argv = build_args_for("riscv64-linux-gnu", CSourceKind::C, |_| {});
        assert!(argv.contains(&"-mno-relax".to_string()));

        let argv = build_args_for("riscv64-linux-gnu", CSourceKind::C, |o| {
            o.cpu_features = kiln_target::CpuFeatures::from_features(vec![
                kiln_target::CpuFeature::llvm("relax", true),
            ]);
        });
        assert!(argv.contains(&"-mrelax".to_string()));
    }

    #[test]
    fn freestanding_flag() {
        let argv = build_args_for("x86_64-freestanding", CSourceKind::C, |_| {});
        assert_eq!(argv.last().unwrap(), "-ffreestanding");
    }

    #[test]
    fn clang_argv_appended_last() {
        let argv = build_args(|o| {
            o.clang_argv = vec!["-Wextra-user-flag".to_string(), "-DDEMO=1".to_string()];
        });
        assert_eq!(&argv[argv.len() - 2..], &["-Wextra-user-flag", "-DDEMO=1"]);
    }

    #[test]
    fn passthrough_keeps_caret_diagnostics() {
        let argv = build_args(|o| o.clang_passthrough_mode = true);
        assert!(!argv.contains(&"-fno-caret-diagnostics".to_string()));
    }

    #[test]
    fn assembly_skips_c_family_flags() {
        let argv = build_args_for("x86_64-linux-musl", CSourceKind::Assembly, |_| {});
        assert!(!argv.contains(&"-nostdinc".to_string()));
        assert!(argv.iter().any(|a| a == "-target"));
    }

    #[test]
    fn framework_dirs_emitted() {
        let argv = build_args_for("aarch64-macos", CSourceKind::C, |o| {
            o.framework_dirs = vec![PathBuf::from("/Frameworks")];
            o.link_libc = false;
        });
        let pos = argv.iter().position(|a| a == "-iframework").unwrap();
        assert_eq!(argv[pos + 1], "/Frameworks");
    }

    #[test]
    fn target_cpu_and_features_via_xclang() {
        let argv = build_args(|o| {
            o.cpu_features = kiln_target::CpuFeatures::from_features(vec![
                kiln_target::CpuFeature::llvm("sse4.2", true),
                kiln_target::CpuFeature::llvm("avx512f", false),
            ]);
        });
        let joined = argv.join(" ");
        assert!(joined.contains("-Xclang -target-cpu -Xclang x86-64"));
        assert!(joined.contains("-Xclang -target-feature -Xclang +sse4.2"));
        assert!(joined.contains("-Xclang -target-feature -Xclang -avx512f"));
    }

    #[test]
    fn function_sections_flag() {
        let argv = build_args(|o| o.function_sections = true);
        assert!(argv.contains(&"-ffunction-sections".to_string()));
    }
}
