use std::path::{Path, PathBuf};
use std::process::ExitCode;

use actbook::{
    Book, Error, ImportFormat, PageGeometry, Result, import_document, normalize, recompute_offsets,
    render_book, render_paginated,
};
use clap::{Parser, Subcommand};

/// Import DOCX/XLSX tables as canonical HTML and paginate minute books to PDF
#[derive(Parser, Debug)]
#[command(name = "actbook")]
#[command(version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a DOCX or XLSX file into canonical HTML
    Import {
        input: PathBuf,

        /// Declared format (docx or xlsx); defaults to the file extension
        #[arg(short, long)]
        format: Option<String>,

        /// Output HTML file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run the normaliser over an HTML file
    Normalize {
        input: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Paginate one canonical HTML document into a PDF
    Render {
        input: PathBuf,

        /// Printed number of the first page
        #[arg(short, long, default_value = "1")]
        start: u32,

        /// Page geometry as JSON
        #[arg(short, long)]
        geometry: Option<PathBuf>,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Re-paginate every Act of a book and print the page offset table
    Offsets {
        /// Book description as JSON
        book: PathBuf,

        #[arg(short, long)]
        geometry: Option<PathBuf>,
    },

    /// Render a whole book (front matter and every Act) into one PDF
    Book {
        book: PathBuf,

        #[arg(short, long)]
        geometry: Option<PathBuf>,

        /// Re-paginate every Act before rendering instead of trusting stored page counts
        #[arg(long)]
        recompute: bool,

        #[arg(short, long)]
        output: PathBuf,
    },
}

fn load_geometry(path: Option<&Path>) -> Result<PageGeometry> {
    match path {
        Some(p) => Ok(serde_json::from_str(&std::fs::read_to_string(p)?)?),
        None => Ok(PageGeometry::default()),
    }
}

fn load_book(path: &Path) -> Result<Book> {
    Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
}

fn write_text(output: Option<&Path>, text: &str) -> Result<()> {
    match output {
        Some(p) => std::fs::write(p, text)?,
        None => println!("{text}"),
    }
    Ok(())
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Import {
            input,
            format,
            output,
        } => {
            let format = match format {
                Some(name) => ImportFormat::from_name(&name)?,
                None => ImportFormat::from_path(&input)?,
            };
            let bytes = std::fs::read(&input)?;
            let html = import_document(&bytes, format)?;
            write_text(output.as_deref(), &html)
        }
        Command::Normalize { input, output } => {
            let html = std::fs::read_to_string(&input)?;
            write_text(output.as_deref(), &normalize(&html))
        }
        Command::Render {
            input,
            start,
            geometry,
            output,
        } => {
            let geometry = load_geometry(geometry.as_deref())?;
            let html = std::fs::read_to_string(&input)?;
            let rendered = render_paginated(&html, start, &geometry)?;
            std::fs::write(&output, &rendered.pdf)?;
            println!(
                "{} pages ({}..={}) -> {}",
                rendered.page_count,
                start,
                rendered.pages.last().map_or(start, |p| p.number),
                output.display()
            );
            Ok(())
        }
        Command::Offsets { book, geometry } => {
            let geometry = load_geometry(geometry.as_deref())?;
            let book = load_book(&book)?;
            let table = recompute_offsets(&book.acts, &book.settings, &geometry)?;
            println!("{}", serde_json::to_string_pretty(&table)?);
            Ok(())
        }
        Command::Book {
            book,
            geometry,
            recompute,
            output,
        } => {
            let geometry = load_geometry(geometry.as_deref())?;
            let mut book = load_book(&book)?;
            if recompute {
                let table = recompute_offsets(&book.acts, &book.settings, &geometry)?;
                for act in &mut book.acts {
                    act.page_count = table.get(&act.id).map(|e| e.page_count);
                }
            }
            let rendered = render_book(&book, &geometry)?;
            std::fs::write(&output, &rendered.document.pdf)?;
            for entry in &rendered.offsets.entries {
                println!(
                    "{}: pages {}..={}",
                    entry.act_id, entry.start_page, entry.end_page
                );
            }
            println!(
                "{} pages -> {}",
                rendered.document.page_count,
                output.display()
            );
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(args.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e @ Error::PaginationInconsistency(_)) => {
            log::error!("{e}; run `actbook book --recompute` or re-save the affected acts");
            ExitCode::from(2)
        }
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
