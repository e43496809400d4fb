//! CLI tool to read a flat record file with one of the built-in layouts.
//!
//! Usage:
//!   flat-dump --layout employee <input.data>
//!   flat-dump --layout order --mode pull <input.data> -o <events.txt>
//!   flat-dump --layout employee --verify <input.data>

use clap::{Parser, ValueEnum};
use flatfile_rs::{
    CharSource, CompositeEntity, DecodeError, Descriptor, EncodeError, Entity, EntityHandler,
    FlatError, OptionalEntity, ReadHandler, ReaderSource, SequenceEntity, TextSource,
    WrappedEntity, layouts,
};
use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Layout {
    /// Last(8) First(10) Dept(10) Salary(8)
    Employee,
    /// Header, counted items, flagged gift note
    Order,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    /// Print events as the push reader reports them
    Push,
    /// Print events pulled one at a time
    Pull,
    /// Read whole records and print the entity tree
    Entity,
}

/// Read a file of newline-terminated flat records.
///
/// Push and pull modes print identical event listings for the same input.
#[derive(Parser)]
#[command(name = "flat-dump")]
struct Cli {
    /// Input data file (one record per line)
    input: String,

    /// Record layout
    #[arg(short, long, value_enum, default_value = "employee")]
    layout: Layout,

    /// Read protocol
    #[arg(short, long, value_enum, default_value = "push")]
    mode: Mode,

    /// Check that the file writes back byte for byte instead of dumping it
    #[arg(long)]
    verify: bool,

    /// Write output to file instead of stdout
    #[arg(short, long)]
    output: Option<String>,

    /// Show layout, mode and record counts on stderr
    #[arg(short, long)]
    verbose: bool,
}

/// Prints one line per read event, indented by nesting depth.
struct EventPrinter {
    out: String,
    depth: usize,
    records: usize,
}

impl EventPrinter {
    fn line(&mut self, text: std::fmt::Arguments<'_>) -> flatfile_rs::Result<()> {
        writeln!(self.out, "{:width$}{text}", "", width = self.depth * 2)
            .map_err(|e| EncodeError::Io(io::Error::other(e)))?;
        Ok(())
    }
}

impl ReadHandler for EventPrinter {
    fn structure_start(&mut self, descriptor: &Descriptor) -> flatfile_rs::Result<()> {
        if self.depth == 1 {
            self.records += 1;
        }
        self.line(format_args!("start {}", descriptor.name()))?;
        self.depth += 1;
        Ok(())
    }

    fn field(&mut self, descriptor: &Descriptor, value: &str) -> flatfile_rs::Result<()> {
        self.line(format_args!("{} = {value:?}", descriptor.name()))
    }

    fn structure_end(&mut self, descriptor: &Descriptor) -> flatfile_rs::Result<()> {
        self.depth = self.depth.saturating_sub(1);
        self.line(format_args!("end {}", descriptor.name()))
    }
}

/// Prints an entity tree with lengths.
struct TreePrinter {
    out: String,
    depth: usize,
}

impl TreePrinter {
    fn nested(&mut self, entity: &Entity, label: &str) {
        let _ = writeln!(
            self.out,
            "{:width$}{} [{label}, {} chars]",
            "",
            entity.name(),
            entity.length(),
            width = self.depth * 2
        );
        self.depth += 1;
        for child in entity.children() {
            child.dispatch(self);
        }
        self.depth -= 1;
    }
}

impl EntityHandler for TreePrinter {
    type Output = ();

    // Every field kind prints the same way.
    fn unhandled(&mut self, entity: &Entity) {
        if let Some(field) = entity.as_field() {
            let _ = writeln!(
                self.out,
                "{:width$}{} = {:?}",
                "",
                field.name(),
                field.value(),
                width = self.depth * 2
            );
        }
    }

    fn composite(&mut self, entity: &Entity, _composite: &CompositeEntity) {
        self.nested(entity, "composite");
    }

    fn sequence(&mut self, entity: &Entity, sequence: &SequenceEntity) {
        let label = format!("{} elements", sequence.len());
        self.nested(entity, &label);
    }

    fn optional(&mut self, entity: &Entity, optional: &OptionalEntity) {
        let label = if optional.is_present() { "present" } else { "absent" };
        self.nested(entity, label);
    }

    fn delimiter_wrapper(&mut self, entity: &Entity, _wrapped: &WrappedEntity) {
        self.nested(entity, "line");
    }
}

fn build_layout(layout: Layout) -> flatfile_rs::Result<Descriptor> {
    let record = match layout {
        Layout::Employee => layouts::employee()?,
        Layout::Order => layouts::order()?,
    };
    layouts::lines_of(record)
}

/// Fail if `source` still holds input once the layout has been read.
fn ensure_consumed(source: &mut dyn CharSource) -> flatfile_rs::Result<()> {
    let position = source.position();
    match source.next_char().map_err(DecodeError::Io)? {
        Some(found) => Err(DecodeError::TrailingInput { position, found }.into()),
        None => Ok(()),
    }
}

/// Returns the text to output and the number of records read.
fn run(cli: &Cli, file: &Descriptor) -> Result<(String, usize), FlatError> {
    if cli.verify {
        let text = fs::read_to_string(&cli.input).map_err(DecodeError::Io)?;
        let entity = file.read_entity(&mut TextSource::new(&text))?;
        let records = entity.as_sequence().map_or(0, SequenceEntity::len);
        let written = entity.to_text()?;
        let report = if written == text {
            format!("OK: {records} records round-trip\n")
        } else {
            format!(
                "MISMATCH: {} characters read, {} written\n",
                text.chars().count(),
                written.chars().count()
            )
        };
        return Ok((report, records));
    }

    let input = File::open(&cli.input).map_err(DecodeError::Io)?;
    let mut source = ReaderSource::new(input);
    let mut printer = EventPrinter {
        out: String::new(),
        depth: 0,
        records: 0,
    };
    match cli.mode {
        Mode::Push => file.push_read(&mut source, &mut printer)?,
        Mode::Pull => {
            for event in file.pull_read(&mut source) {
                event?.deliver(&mut printer)?;
            }
        }
        Mode::Entity => {
            let entity = file.read_entity(&mut source)?;
            ensure_consumed(&mut source)?;
            let mut tree = TreePrinter {
                out: String::new(),
                depth: 0,
            };
            entity.dispatch(&mut tree);
            let records = entity.as_sequence().map_or(0, SequenceEntity::len);
            return Ok((tree.out, records));
        }
    }
    ensure_consumed(&mut source)?;
    Ok((printer.out, printer.records))
}

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let file = match build_layout(cli.layout) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Layout error: {e}");
            process::exit(1);
        }
    };

    if cli.verbose {
        eprintln!("Input:  {}", cli.input);
        eprintln!("Output: {}", cli.output.as_deref().unwrap_or("(stdout)"));
        eprintln!("Layout: {:?}", cli.layout);
        eprintln!("Mode:   {:?}", cli.mode);
    }

    match run(&cli, &file) {
        Ok((output, records)) => {
            if let Some(out_path) = &cli.output {
                if let Some(parent) = Path::new(out_path.as_str()).parent()
                    && !parent.as_os_str().is_empty()
                    && fs::create_dir_all(parent).is_err()
                {
                    eprintln!("Error creating output directory for '{out_path}'");
                    process::exit(1);
                }
                if let Err(e) = fs::write(out_path, &output) {
                    eprintln!("Error writing output file '{out_path}': {e}");
                    process::exit(1);
                }
            } else if let Err(e) = io::stdout().write_all(output.as_bytes()) {
                eprintln!("Error writing output: {e}");
                process::exit(1);
            }
            if cli.verbose {
                eprintln!("Records: {records}");
            }
            if output.starts_with("MISMATCH") {
                process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("Read error: {e}");
            process::exit(1);
        }
    }
}
