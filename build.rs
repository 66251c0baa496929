// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Override argument that also reads an environment variable
fn override_arg(id: &'static str, long: &'static str, env: &'static str, help: &'static str) -> Arg {
    Arg::new(id).long(long).env(env).global(true).help(help)
}

fn build_cli() -> Command {
    Command::new("apk-repack")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Repackage a split APK against a replacement server")
        .subcommand_required(false)
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .global(true)
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("work_dir")
                .short('C')
                .long("work-dir")
                .value_name("DIR")
                .global(true)
                .help("Directory holding inputs, artifacts and downloaded tools"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Enable debug logging"),
        )
        .arg(override_arg("java_command", "java-command", "JAVA_COMMAND", "Java launcher for downloaded .jar tools"))
        .arg(override_arg("apkeditor_command", "apkeditor-command", "APKEDITOR_COMMAND", "Command prefix for APKEditor"))
        .arg(override_arg("apktool_command", "apktool-command", "APKTOOL_COMMAND", "Command prefix for apktool"))
        .arg(override_arg("imagemagick_command", "imagemagick-command", "IMAGEMAGICK_COMMAND", "Command prefix for ImageMagick"))
        .arg(override_arg("signing_command", "signing-command", "SIGNING_COMMAND", "Signing command; receives the APK path as its last argument"))
        .arg(override_arg("replacement_url", "replacement-url", "REPLACEMENT_SERVER_URL", "Endpoint written into the asset manifest and native libraries"))
        .subcommand(
            Command::new("run")
                .about("Run the pipeline, resuming after the last finished artifact")
                .arg(Arg::new("input_dir").long("input-dir").value_name("DIR").help("Directory with the split APK parts"))
                .arg(Arg::new("package_suffix").long("package-suffix").help("Suffix appended to the package name"))
                .arg(Arg::new("icon").long("icon").value_name("FILE").help("SVG used for the icon and title screen"))
                .arg(
                    Arg::new("no_restyle")
                        .long("no-restyle")
                        .action(ArgAction::SetTrue)
                        .help("Skip the icon and title screen stage"),
                ),
        )
        .subcommand(Command::new("status").about("Show which stages have produced their artifacts"))
        .subcommand(
            Command::new("reset")
                .about("Delete the artifacts of a stage and every later stage")
                .arg(Arg::new("stage").required(true).help("Stage name, e.g. decompiled or rebuilt")),
        )
        .subcommand(
            Command::new("restore")
                .about("Copy pristine snapshots back over the working tree")
                .arg(Arg::new("resource").help("Resource relative to the decompiled tree (all if omitted)")),
        )
        .subcommand(Command::new("resolve").about("Resolve every external tool and print its invocation"))
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("apk-repack.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
