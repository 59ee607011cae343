use anyhow::{Context, Result, bail, format_err};
use clap::builder::PossibleValuesParser;
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use dialoguer::Confirm;
use encoding::all::encodings;
use encoding::types::Encoding;
use indoc::indoc;
use log::{LevelFilter, info};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use uicc_bml::{BmlFile, BmlParser, ParserSettings};

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::exit;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BmlOutputFormat {
    /// The whole file as one indented document.
    Json,
    /// One single-line object per section.
    JsonL,
}

struct BmlDump {
    parser_settings: ParserSettings,
    input: PathBuf,
    output_format: BmlOutputFormat,
    output: Box<dyn Write>,
    tree_region_output: Option<PathBuf>,
    verbosity_level: Option<LevelFilter>,
}

/// Tries to write a line to a given target, aborts program if fails.
macro_rules! try_writeln {
    ($($arg:tt)*) => (
        match writeln!($($arg)*) {
            Ok(_) => {},
            Err(e) => {
                eprintln!("{}", &e);
                exit(1)
            }
        }
    );
}

impl BmlDump {
    pub fn from_cli_matches(matches: &ArgMatches) -> Result<Self> {
        let input = matches
            .get_one::<String>("INPUT")
            .map(PathBuf::from)
            .ok_or_else(|| format_err!("missing input path"))?;

        let output_format = match matches.get_one::<String>("output-format").map(String::as_str) {
            Some("jsonl") => BmlOutputFormat::JsonL,
            _ => BmlOutputFormat::Json,
        };

        let verbosity_level = match matches.get_count("verbose") {
            0 => None,
            1 => Some(LevelFilter::Info),
            2 => Some(LevelFilter::Debug),
            3 => Some(LevelFilter::Trace),
            _ => {
                eprintln!("using more than -vvv does not affect verbosity level");
                Some(LevelFilter::Trace)
            }
        };

        let mut parser_settings =
            ParserSettings::new().resolve_pointers(!matches.get_flag("no-resolve"));
        if let Some(max_depth) = matches.get_one::<usize>("max-depth") {
            parser_settings = parser_settings.max_depth(*max_depth);
        }

        if let Some(name) = matches.get_one::<String>("ansi-codec") {
            let ansi_codec = encodings()
                .iter()
                .find(|c| c.name() == name)
                .ok_or_else(|| format_err!("unknown ansi codec `{}`", name))?;
            parser_settings = parser_settings.ansi_codec(*ansi_codec);
        }

        let output: Box<dyn Write> = match matches.get_one::<String>("output-target") {
            Some(path) => {
                let prompt = !matches.get_flag("no-confirm-overwrite");
                let f = Self::create_output_file(path, prompt).with_context(|| {
                    format!("An error occurred while creating output file at `{}`", path)
                })?;
                Box::new(f)
            }
            None => Box::new(io::stdout()),
        };

        Ok(BmlDump {
            parser_settings,
            input,
            output_format,
            output,
            tree_region_output: matches.get_one::<String>("tree-region").map(PathBuf::from),
            verbosity_level,
        })
    }

    /// Main entry point for `BmlDump`
    pub fn run(&mut self) -> Result<()> {
        self.try_to_initialize_logging();

        let file = BmlParser::from_path(&self.input)?
            .with_configuration(self.parser_settings.clone())
            .parse()
            .with_context(|| format!("Failed to parse `{}`", self.input.display()))?;

        if let Some(path) = &self.tree_region_output {
            self.dump_tree_region(&file, path)?;
        }

        match self.output_format {
            BmlOutputFormat::Json => {
                let rendered = serde_json::to_string_pretty(&file)?;
                try_writeln!(self.output, "{}", rendered);
            }
            BmlOutputFormat::JsonL => {
                let sections = [
                    ("header", serde_json::to_value(&file.header)?),
                    ("strings", serde_json::to_value(&file.strings)?),
                    ("commands", serde_json::to_value(&file.commands)?),
                    ("string_table", serde_json::to_value(&file.string_table)?),
                    ("region", serde_json::to_value(&file.region)?),
                    ("tree", serde_json::to_value(&file.tree)?),
                ];
                for (name, value) in sections {
                    let line = serde_json::json!({ "section": name, "value": value });
                    try_writeln!(self.output, "{}", line);
                }
            }
        }

        self.output.flush()?;
        Ok(())
    }

    /// Writes the raw bytes of the main tag tree, from the root tag up to the supplementary section.
    fn dump_tree_region(&self, file: &BmlFile, path: &Path) -> Result<()> {
        let (start, end) = file.tree_region();
        let data = fs::read(&self.input)
            .with_context(|| format!("Failed to re-read `{}`", self.input.display()))?;

        if start > end || end > data.len() as u64 {
            bail!(
                "Tag tree region `0x{:08x}..0x{:08x}` is outside of the file ({} bytes)",
                start,
                end,
                data.len()
            );
        }

        let mut out = Self::create_output_file(path, false)?;
        out.write_all(&data[start as usize..end as usize])?;
        info!(
            "Wrote {} tag tree bytes to `{}`",
            end - start,
            path.display()
        );
        Ok(())
    }

    /// If `prompt` is passed, will display a confirmation prompt before overwriting files.
    fn create_output_file(path: impl AsRef<Path>, prompt: bool) -> Result<File> {
        let p = path.as_ref();

        if p.is_dir() {
            bail!(
                "There is a directory at {}, refusing to overwrite",
                p.display()
            );
        }

        if p.exists() {
            if prompt {
                match Confirm::new()
                    .with_prompt(format!(
                        "Are you sure you want to override output file at {}",
                        p.display()
                    ))
                    .default(false)
                    .interact()
                {
                    Ok(true) => Ok(File::create(p)?),
                    Ok(false) => bail!("Cancelled"),
                    Err(e) => bail!(
                        "Failed to write confirmation prompt to term caused by\n{}",
                        e
                    ),
                }
            } else {
                Ok(File::create(p)?)
            }
        } else {
            // Ok to assume p is not an existing directory
            match p.parent() {
                Some(parent) => {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        fs::create_dir_all(parent)?;
                    }
                    Ok(File::create(p)?)
                }
                None => bail!("Output file cannot be root."),
            }
        }
    }

    fn try_to_initialize_logging(&self) {
        if let Some(level) = self.verbosity_level {
            if let Err(e) = TermLogger::init(
                level,
                Config::default(),
                TerminalMode::Stderr,
                ColorChoice::Auto,
            ) {
                eprintln!("Failed to initialize logging: {}", e)
            }
        }
    }
}

fn command() -> Command {
    Command::new("BML Parser")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Utility to decode compiled ribbon markup (BML) files")
        .arg(Arg::new("INPUT").required(true))
        .arg(
            Arg::new("output-format")
                .short('o')
                .long("format")
                .value_parser(["json", "jsonl"])
                .default_value("json")
                .help("Sets the output format")
                .long_help(indoc!(r#"
                    Sets the output format:
                        "json"  - the whole file as one indented document.
                        "jsonl" - one single-line `{"section", "value"}` object per section.
                "#)),
        )
        .arg(
            Arg::new("output-target")
                .long("output")
                .short('f')
                .action(ArgAction::Set)
                .help(indoc!("Writes output to the file specified instead of stdout, errors will still be printed to stderr.
                       Will ask for confirmation before overwriting files, to allow overwriting, pass `--no-confirm-overwrite`
                       Will create parent directories if needed.")),
        )
        .arg(
            Arg::new("no-confirm-overwrite")
                .long("no-confirm-overwrite")
                .action(ArgAction::SetTrue)
                .help("When set, will not ask for confirmation before overwriting files, useful for automation"),
        )
        .arg(
            Arg::new("tree-region")
                .long("tree-region")
                .value_name("PATH")
                .action(ArgAction::Set)
                .help("Also writes the raw bytes of the main tag tree to PATH, overwriting it."),
        )
        .arg(
            Arg::new("max-depth")
                .long("max-depth")
                .value_name("N")
                .value_parser(value_parser!(usize))
                .help("Deepest tag nesting accepted before decoding fails (default: 64)."),
        )
        .arg(
            Arg::new("ansi-codec")
                .long("ansi-codec")
                .value_parser(PossibleValuesParser::new(
                    encodings()
                        .iter()
                        .filter(|&e| e.raw_decoder().is_ascii_compatible())
                        .map(|e| e.name()),
                ))
                .default_value(encoding::all::WINDOWS_1252.name())
                .help("When set, controls the codec of the single-byte strings in the unknown string list."),
        )
        .arg(
            Arg::new("no-resolve")
                .long("no-resolve")
                .action(ArgAction::SetTrue)
                .help("When set, pointers are reported but their target collections are not decoded."),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .action(ArgAction::Count)
                .help(indoc!("Sets debug prints level for the application:
                    -v   - info
                    -vv  - debug
                    -vvv - trace
                    NOTE: trace output is only available in debug builds, as it is extremely verbose.")),
        )
}

fn main() {
    let matches = command().get_matches();

    let result = BmlDump::from_cli_matches(&matches).and_then(|mut app| app.run());
    if let Err(e) = result {
        eprintln!("{:?}", e);
        exit(1);
    }
}
