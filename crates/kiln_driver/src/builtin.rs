//! Generation of the builtin source file describing the build.
//!
//! Every compilation with a root module materializes a generated source file
//! the standard library imports to learn how it was built: target, modes,
//! features, and (for test builds) the late-bound test function table. The
//! constants declared here are a compatibility contract with the standard
//! library; renaming one is a breaking change.

use kiln_config::{CompilationOptions, OutputMode};
use kiln_config::resolve::ResolvedConfig;
use kiln_target::OsVersionRange;
use std::fmt::Write;

/// The basename of the generated file in the module's artifact directory.
pub const BUILTIN_BASENAME: &str = "builtin.kn";

/// Renders the builtin source text for this compilation.
pub fn generate_builtin_source(options: &CompilationOptions, config: &ResolvedConfig) -> String {
    let target = &options.target;
    let mut out = String::with_capacity(1024);

    out.push_str("// Generated by the build driver; describes this compilation.\n");

    let output_mode = match options.output_mode {
        OutputMode::Exe => "exe",
        OutputMode::Lib => "lib",
        OutputMode::Obj => "obj",
    };
    let link_mode = match config.link_mode {
        kiln_config::LinkMode::Static => "static",
        kiln_config::LinkMode::Dynamic => "dynamic",
    };

    writeln!(out, "const output_mode = OutputMode.{output_mode};").unwrap();
    writeln!(out, "const link_mode = LinkMode.{link_mode};").unwrap();
    writeln!(out, "const is_test = {};", options.is_test).unwrap();
    writeln!(out, "const single_threaded = {};", config.single_threaded).unwrap();
    writeln!(
        out,
        "const abi = Abi.{};",
        target.abi.name().unwrap_or("none")
    )
    .unwrap();

    let features = feature_list(options);
    writeln!(out, "const cpu = Cpu{{").unwrap();
    writeln!(out, "    .arch = Arch.{},", target.arch.name()).unwrap();
    writeln!(out, "    .model = \"{}\",", options.cpu_model.name).unwrap();
    writeln!(out, "    .features = \"{features}\",").unwrap();
    writeln!(out, "}};").unwrap();

    let range = options
        .os_version_range
        .unwrap_or_else(|| OsVersionRange::default_for_target(target));
    writeln!(out, "const os = Os{{").unwrap();
    writeln!(out, "    .tag = OsTag.{},", target.os.name()).unwrap();
    match range {
        OsVersionRange::None => {
            writeln!(out, "    .version_range = VersionRange.none,").unwrap();
        }
        OsVersionRange::Semver(r) => {
            writeln!(out, "    .version_range = VersionRange.semver(.{{").unwrap();
            writeln!(out, "        .min = \"{}\",", r.min).unwrap();
            writeln!(out, "        .max = \"{}\",", r.max).unwrap();
            writeln!(out, "    }}),").unwrap();
        }
        OsVersionRange::Linux(r) => {
            writeln!(out, "    .version_range = VersionRange.linux(.{{").unwrap();
            writeln!(out, "        .min = \"{}\",", r.range.min).unwrap();
            writeln!(out, "        .max = \"{}\",", r.range.max).unwrap();
            writeln!(out, "        .glibc = \"{}\",", r.glibc).unwrap();
            writeln!(out, "    }}),").unwrap();
        }
        OsVersionRange::Windows { min, max } => {
            writeln!(out, "    .version_range = VersionRange.windows(.{{").unwrap();
            writeln!(out, "        .min = {min},").unwrap();
            writeln!(out, "        .max = {max},").unwrap();
            writeln!(out, "    }}),").unwrap();
        }
    }
    writeln!(out, "}};").unwrap();

    writeln!(out, "const object_format = ObjectFormat.{};", config.object_format).unwrap();
    writeln!(out, "const mode = Mode.{};", mode_name(options)).unwrap();
    writeln!(out, "const link_libc = {};", config.link_libc).unwrap();
    writeln!(out, "const link_libcpp = {};", options.link_libcpp).unwrap();
    writeln!(
        out,
        "const have_error_return_tracing = {};",
        config.error_return_tracing
    )
    .unwrap();
    writeln!(out, "const valgrind_support = {};", config.valgrind).unwrap();
    writeln!(out, "const position_independent_code = {};", config.pic).unwrap();
    writeln!(out, "const strip_debug_info = {};", config.strip).unwrap();
    writeln!(out, "const code_model = CodeModel.{};", code_model_name(config)).unwrap();

    if options.is_test {
        out.push_str("\n// Filled in by the test runner before main start.\n");
        out.push_str("var test_functions = TestFn[]{};\n");
        let io_mode = if options.test_evented_io {
            "evented"
        } else {
            "blocking"
        };
        writeln!(out, "const test_io_mode = IoMode.{io_mode};").unwrap();
    }

    out
}

fn mode_name(options: &CompilationOptions) -> &'static str {
    match options.optimize_mode {
        kiln_config::OptimizeMode::Debug => "debug",
        kiln_config::OptimizeMode::ReleaseSafe => "release_safe",
        kiln_config::OptimizeMode::ReleaseFast => "release_fast",
        kiln_config::OptimizeMode::ReleaseSmall => "release_small",
    }
}

fn code_model_name(config: &ResolvedConfig) -> String {
    format!("{:?}", config.code_model).to_lowercase()
}

fn feature_list(options: &CompilationOptions) -> String {
    let mut parts = Vec::new();
    for feature in options.cpu_features.iter() {
        let sign = if feature.enabled { '+' } else { '-' };
        parts.push(format!("{sign}{}", feature.name));
    }
    parts.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_config::{resolve, CompilationOptions, OutputMode};
    use kiln_target::{CpuFeature, CpuFeatures, Triple};

    fn generate(target: &str, mutate: impl FnOnce(&mut CompilationOptions)) -> String {
        let target: Triple = target.parse().unwrap();
        let mut options = CompilationOptions::new("demo", target);
        mutate(&mut options);
        let config = resolve(&options, true).unwrap();
        generate_builtin_source(&options, &config)
    }

    #[test]
    fn declares_required_constants() {
        let src = generate("x86_64-linux-musl", |o| {
            o.output_mode = OutputMode::Exe;
            o.link_libc = true;
        });
        for needle in [
            "const output_mode = OutputMode.exe;",
            "const link_mode = LinkMode.static;",
            "const is_test = false;",
            "const single_threaded = false;",
            "const abi = Abi.musl;",
            ".arch = Arch.x86_64,",
            ".tag = OsTag.linux,",
            "const object_format = ObjectFormat.elf;",
            "const mode = Mode.debug;",
            "const link_libc = true;",
            "const link_libcpp = false;",
            "const have_error_return_tracing = true;",
            "const valgrind_support = false;",
            "const position_independent_code = false;",
            "const strip_debug_info = false;",
            "const code_model = CodeModel.default;",
        ] {
            assert!(src.contains(needle), "missing {needle:?} in:\n{src}");
        }
    }

    #[test]
    fn linux_range_embeds_glibc_version() {
        let src = generate("x86_64-linux-gnu", |_| {});
        assert!(src.contains("VersionRange.linux(.{"));
        assert!(src.contains(".glibc = \"2.28.0\","));
    }

    #[test]
    fn windows_range_uses_build_numbers() {
        let src = generate("x86_64-windows-gnu", |_| {});
        assert!(src.contains("VersionRange.windows(.{"));
        assert!(src.contains(".min = 0x0a000000,"));
    }

    #[test]
    fn freestanding_has_no_version_range() {
        let src = generate("x86_64-freestanding", |_| {});
        assert!(src.contains("const os = Os{"));
        assert!(src.contains(".version_range = VersionRange.none,"));
    }

    #[test]
    fn macos_uses_semver_range() {
        let src = generate("aarch64-macos", |_| {});
        assert!(src.contains("VersionRange.semver(.{"));
    }

    #[test]
    fn test_builds_declare_test_table() {
        let src = generate("x86_64-linux-musl", |o| {
            o.is_test = true;
        });
        assert!(src.contains("var test_functions = TestFn[]{};"));
        assert!(src.contains("const test_io_mode = IoMode.blocking;"));

        let evented = generate("x86_64-linux-musl", |o| {
            o.is_test = true;
            o.test_evented_io = true;
        });
        assert!(evented.contains("const test_io_mode = IoMode.evented;"));
    }

    #[test]
    fn non_test_builds_omit_test_table() {
        let src = generate("x86_64-linux-musl", |_| {});
        assert!(!src.contains("test_functions"));
        assert!(!src.contains("test_io_mode"));
    }

    #[test]
    fn feature_string_signs() {
        let src = generate("x86_64-linux-musl", |o| {
            o.cpu_features = CpuFeatures::from_features(vec![
                CpuFeature::llvm("sse2", true),
                CpuFeature::llvm("avx", false),
            ]);
        });
        assert!(src.contains(".features = \"+sse2,-avx\","));
    }

    #[test]
    fn release_mode_names() {
        let src = generate("x86_64-linux-musl", |o| {
            o.optimize_mode = kiln_config::OptimizeMode::ReleaseSmall;
        });
        assert!(src.contains("const mode = Mode.release_small;"));
    }
}
