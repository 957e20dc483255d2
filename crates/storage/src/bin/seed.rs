use std::fmt;

use compagnon_core::model::{Module, ModuleId, Submodule, SubmoduleId, TemplateKind, ThemeDraft};
use storage::repository::Storage;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    modules: u32,
    theme_name: Option<String>,
    primary_color: Option<String>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidModules { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidModules { raw } => write!(f, "invalid --modules value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("COMPAGNON_DB_URL").unwrap_or_else(|_| "sqlite:compagnon.sqlite3".into());
        let mut modules = std::env::var("COMPAGNON_SEED_MODULES")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(2);
        let mut theme_name = None;
        let mut primary_color = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--modules" => {
                    let value = require_value(&mut args, "--modules")?;
                    modules = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidModules { raw: value.clone() })?;
                }
                "--theme-name" => {
                    theme_name = Some(require_value(&mut args, "--theme-name")?);
                }
                "--primary-color" => {
                    primary_color = Some(require_value(&mut args, "--primary-color")?);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            modules,
            theme_name,
            primary_color,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:compagnon.sqlite3)");
    eprintln!("  --modules <n>             Number of demo modules to upsert (default: 2)");
    eprintln!("  --theme-name <name>       Store a platform theme with this name");
    eprintln!("  --primary-color <#RRGGBB> Primary color for the stored theme");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  COMPAGNON_DB_URL, COMPAGNON_SEED_MODULES");
}

/// Slide plan for a demo module: intro, content, a quiz gate, more content,
/// a poll gate and a closing summary.
const DEMO_SLIDES: [(&str, TemplateKind, u32); 6] = [
    ("Welcome", TemplateKind::Title, 30),
    ("Key ideas", TemplateKind::Content, 180),
    ("Check your understanding", TemplateKind::Quiz, 120),
    ("Worked example", TemplateKind::Video, 240),
    ("What did you think?", TemplateKind::Poll, 60),
    ("Wrap-up", TemplateKind::Summary, 60),
];

fn demo_module(index: u32) -> Result<Module, compagnon_core::Error> {
    let module_id = u64::from(index + 1);
    let submodules = DEMO_SLIDES
        .iter()
        .zip(1_u64..)
        .map(|((title, template, secs), n)| {
            Submodule::new(
                SubmoduleId::new(module_id * 100 + n),
                *title,
                *template,
                *secs,
            )
        })
        .collect();
    Ok(Module::new(
        ModuleId::new(module_id),
        format!("Demo module {module_id}"),
        submodules,
    )?)
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;

    for i in 0..args.modules {
        let module = demo_module(i)?;
        storage.modules.upsert_module(&module).await?;
    }

    if args.theme_name.is_some() || args.primary_color.is_some() {
        let theme = ThemeDraft {
            name: args.theme_name.clone(),
            primary_color: args.primary_color.clone(),
            ..ThemeDraft::default()
        }
        .validate()
        .map_err(compagnon_core::Error::from)?;
        storage.themes.save_theme(&theme).await?;
        println!("Stored theme {}", theme.name());
    }

    println!("Seeded {} demo modules into {}", args.modules, args.db_url);

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
