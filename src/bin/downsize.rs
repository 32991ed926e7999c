use clap::{crate_name, crate_version, Arg, ArgAction, Command};
use gifdownsize::progress::{NoProgress, ProgressBar, ProgressReporter};
use gifdownsize::{Gif, Settings};

pub type BinResult<T, E = Box<dyn std::error::Error + Send + Sync>> = Result<T, E>;

use std::env;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

fn main() {
    if let Err(e) = bin_main() {
        eprintln!("error: {e}");
        if let Some(e) = e.source() {
            eprintln!("error: {e}");
        }
        std::process::exit(1);
    }
}

fn bin_main() -> BinResult<()> {
    let matches = Command::new(crate_name!())
        .version(crate_version!())
        .about("Makes GIF files smaller without changing how they look")
        .arg_required_else_help(true)
        .arg(Arg::new("INPUT")
            .help("GIF file to optimize")
            .value_parser(clap::value_parser!(PathBuf))
            .required(true))
        .arg(Arg::new("OUTPUT")
            .help("Destination file; \"-\" means stdout.\nDefaults to the input name with \"-downsized\" added")
            .value_parser(clap::value_parser!(PathBuf)))
        .arg(Arg::new("quiet")
            .long("quiet")
            .short('q')
            .action(ArgAction::SetTrue)
            .help("Do not display anything on standard output/console"))
        .arg(Arg::new("no-stamp")
            .long("no-stamp")
            .action(ArgAction::SetTrue)
            .help("Do not add a comment naming this program to the file"))
        .get_matches_from(wild::args_os());

    let input = matches.get_one::<PathBuf>("INPUT").ok_or("Missing input")?;
    check_if_path_exists(input)?;
    let output_name = match matches.get_one::<PathBuf>("OUTPUT") {
        Some(p) => p.clone(),
        None => default_output_path(input),
    };
    let output_path = DestPath::new(output_name.as_os_str());
    let quiet = matches.get_flag("quiet") || output_path == DestPath::Stdout;
    let settings = Settings {
        stamp: !matches.get_flag("no-stamp"),
    };

    let data = fs::read(input).map_err(|e| format!("Can't read {}: {e}", input.display()))?;

    let gif = Gif::from_bytes(&data)?;
    if !quiet {
        println!("{}\n", gif.summary());
    }

    let mut pb;
    let mut nopb = NoProgress {};
    let progress: &mut dyn ProgressReporter = if quiet {
        &mut nopb
    } else {
        pb = ProgressBar::new(0);
        pb.show_speed = false;
        pb.show_percent = false;
        pb.format(" #_. ");
        pb.set_max_refresh_rate(Some(Duration::from_millis(250)));
        &mut pb
    };

    let optimized = gifdownsize::optimize(gif, progress)?;
    let output = optimized.to_bytes(&settings)?;
    progress.done(&format!("{} -> {} bytes", data.len(), output.len()));
    if output.len() >= data.len() {
        return Err(format!("File '{}' cannot be downsized.", input.display()).into());
    }

    match output_path {
        DestPath::Path(p) => {
            fs::write(p, &output).map_err(|e| format!("Can't write to {}: {e}", p.display()))?;
        },
        DestPath::Stdout => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&output)?;
            stdout.flush()?;
        },
    }

    if !quiet {
        println!("\n{}\n", optimized.summary());
        println!("Size(bytes): {} -> {}", data.len(), output.len());
        println!("Export to: {output_path}");
    }
    Ok(())
}

/// `anim.gif` becomes `anim-downsized.gif`
fn default_output_path(input: &Path) -> PathBuf {
    let mut name = OsString::from(input.file_stem().unwrap_or(OsStr::new("out")));
    name.push("-downsized.");
    name.push(input.extension().unwrap_or(OsStr::new("gif")));
    input.with_file_name(name)
}

fn check_if_path_exists(path: &Path) -> BinResult<()> {
    if !path.exists() {
        let mut msg = format!("Unable to find the input file: \"{}\"", path.display());
        if path.is_relative() {
            msg += &format!(" (searched in \"{}\")", env::current_dir()?.display());
        }
        return Err(msg.into());
    }
    Ok(())
}

#[derive(PartialEq)]
enum DestPath<'a> {
    Path(&'a Path),
    Stdout,
}

impl<'a> DestPath<'a> {
    pub fn new(path: &'a OsStr) -> Self {
        if path == "-" {
            Self::Stdout
        } else {
            Self::Path(Path::new(path))
        }
    }
}

impl fmt::Display for DestPath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Path(orig_path) => {
                let abs_path = dunce::canonicalize(orig_path);
                abs_path.as_ref().map(|p| p.as_path()).unwrap_or(orig_path).display().fmt(f)
            },
            Self::Stdout => f.write_str("stdout"),
        }
    }
}

#[test]
fn output_name() {
    assert_eq!(default_output_path(Path::new("dir/anim.gif")), Path::new("dir/anim-downsized.gif"));
    assert_eq!(default_output_path(Path::new("anim")), Path::new("anim-downsized.gif"));
    assert!(DestPath::new(OsStr::new("-")) == DestPath::Stdout);
}
