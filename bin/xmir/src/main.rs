use xmir::decode::Mode;
use xmir::jvm::class_file::Version;
use xmir::translate;
use xmir::xmir::{xml, Listing};

use clap::{crate_version, value_parser, Arg, ArgAction, ArgMatches, Command};
use std::fs;
use std::path::{Path, PathBuf};

fn main() -> Result<(), translate::Error> {
    env_logger::init();

    let input = || {
        Arg::new("INPUT")
            .help("File to translate")
            .required(true)
            .value_parser(value_parser!(PathBuf))
            .index(1)
    };
    let output_dir = || {
        Arg::new("output-dir")
            .long("output-dir")
            .value_name("DIR")
            .default_value(".")
            .value_parser(value_parser!(PathBuf))
            .help("Directory under which package directories are created")
    };
    let output = || {
        Arg::new("output")
            .long("output")
            .short('o')
            .value_name("FILE")
            .value_parser(value_parser!(PathBuf))
            .help("Write the result here instead of to standard output")
    };

    let matches = Command::new("XMIR translator")
        .version(crate_version!())
        .about("Translate JVM class files to and from XMIR documents")
        .subcommand_required(true)
        .subcommand(
            Command::new("disassemble")
                .about("Turn a class file into an XMIR document")
                .arg(input())
                .arg(output_dir())
                .arg(
                    Arg::new("mode")
                        .long("mode")
                        .value_name("MODE")
                        .default_value("full")
                        .value_parser(["full", "debug", "short"])
                        .help("Keep (`full`) or drop (`short`) debug information"),
                )
                .arg(
                    Arg::new("comments")
                        .long("comments")
                        .action(ArgAction::SetTrue)
                        .help("Describe every instruction in a comment"),
                )
                .arg(
                    Arg::new("listing")
                        .long("listing")
                        .value_name("LISTING")
                        .default_value("omitted")
                        .value_parser(["omitted", "none", "summary", "full"])
                        .help("Disassembly to embed in the document"),
                ),
        )
        .subcommand(
            Command::new("assemble")
                .about("Turn an XMIR document (plain or canonical) into a class file")
                .arg(input())
                .arg(output_dir())
                .arg(
                    Arg::new("target")
                        .long("target")
                        .value_name("VERSION")
                        .value_parser(|target: &str| {
                            Version::parse(target)
                                .ok_or_else(|| format!("invalid class file version '{}'", target))
                        })
                        .help("Class file version to write (eg. `52.0`)"),
                )
                .arg(
                    Arg::new("no-verify")
                        .long("no-verify")
                        .action(ArgAction::SetTrue)
                        .help("Skip checking the written method bodies"),
                ),
        )
        .subcommand(
            Command::new("phi")
                .about("Rewrite a plain XMIR document into canonical form")
                .arg(input())
                .arg(output()),
        )
        .subcommand(
            Command::new("unphi")
                .about("Rewrite a canonical XMIR document into plain form")
                .arg(input())
                .arg(output()),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("disassemble", matches)) => disassemble(matches),
        Some(("assemble", matches)) => assemble(matches),
        Some(("phi", matches)) => rewrite(matches, translate::to_phi),
        Some(("unphi", matches)) => rewrite(matches, translate::from_phi),
        _ => unreachable!("a subcommand is required"),
    }
}

fn input(matches: &ArgMatches) -> &Path {
    matches
        .get_one::<PathBuf>("INPUT")
        .expect("INPUT is required")
}

fn output_dir(matches: &ArgMatches) -> &Path {
    matches
        .get_one::<PathBuf>("output-dir")
        .expect("output-dir has a default")
}

fn disassemble(matches: &ArgMatches) -> Result<(), translate::Error> {
    let mode: Mode = matches
        .get_one::<String>("mode")
        .map_or(Ok(Mode::Full), |mode| mode.parse())?;
    let listing = matches
        .get_one::<String>("listing")
        .and_then(|listing| listing.parse::<Listing>().ok())
        .unwrap_or_default();
    let settings = translate::Settings::new(mode)
        .with_comments(matches.get_flag("comments"))
        .with_listing(listing);

    let class_file = input(matches);
    log::info!("Reading '{}'", class_file.display());
    let bytes = fs::read(class_file)?;
    let document = translate::disassemble(&bytes, &settings)?;
    let path = program_path(output_dir(matches), &document, "xmir")?;
    write(&path, document.as_bytes())
}

fn assemble(matches: &ArgMatches) -> Result<(), translate::Error> {
    let settings = translate::Settings::default()
        .with_target(matches.get_one::<Version>("target").copied())
        .with_verify(!matches.get_flag("no-verify"));

    let document_file = input(matches);
    log::info!("Reading '{}'", document_file.display());
    let document = fs::read_to_string(document_file)?;
    let bytes = translate::assemble(&document, &settings)?;
    let path = program_path(output_dir(matches), &document, "class")?;
    write(&path, &bytes)
}

fn rewrite(
    matches: &ArgMatches,
    translation: fn(&str) -> Result<String, translate::Error>,
) -> Result<(), translate::Error> {
    let document_file = input(matches);
    log::info!("Reading '{}'", document_file.display());
    let document = translation(&fs::read_to_string(document_file)?)?;
    match matches.get_one::<PathBuf>("output") {
        Some(path) => write(path, document.as_bytes()),
        None => {
            print!("{}", document);
            Ok(())
        }
    }
}

/// Output path of the class a document describes: `<dir>/<package path>/<name>.<extension>`
fn program_path(dir: &Path, document: &str, extension: &str) -> Result<PathBuf, translate::Error> {
    let root = xml::parse(document)?;
    let mut path = dir.to_owned();
    if let Some(program) = root.elements().find(|e| e.name == "program") {
        let package = program.attribute("package").unwrap_or_default();
        for segment in package.split('.').filter(|s| !s.is_empty()) {
            path.push(segment);
        }
        path.push(program.attribute("name").unwrap_or("Unnamed"));
    }
    path.set_extension(extension);
    Ok(path)
}

fn write(path: &Path, contents: &[u8]) -> Result<(), translate::Error> {
    log::info!("Writing '{}'", path.display());
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;
    Ok(())
}
