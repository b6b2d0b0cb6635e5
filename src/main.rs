use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Parser, Subcommand};
use snafu::{ResultExt, Snafu};

use jrb8::error::{AsmError, CompileError, FixtureError};
use jrb8::fixture::{self, Expectation};
use jrb8::log::{self, Level};
use jrb8::{RunOutcome, Vm, assemble_source, compile, disasm, ir};
use jrb8::{debug, error, info, warn};

#[derive(Parser, Debug)]
#[command(
  name = "jrb8",
  version,
  about = "Compiler, assembler and emulator for the jrb8 8-bit CPU"
)]
struct Cli {
  /// Raise log verbosity (repeatable).
  #[arg(short, long, action = ArgAction::Count, global = true)]
  verbose: u8,
  /// Only report errors.
  #[arg(short, long, action = ArgAction::SetTrue, global = true, conflicts_with = "verbose")]
  quiet: bool,
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Compile a source file to machine code.
  Compile {
    source: PathBuf,
    /// Output file, `-` for stdout. Defaults to `<source>.o`.
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
    /// Also write the generated assembly next to the output.
    #[arg(long)]
    emit_asm: bool,
    /// Also write a disassembly listing next to the output.
    #[arg(long)]
    listing: bool,
  },
  /// Assemble a mnemonic file to machine code.
  Assemble {
    source: PathBuf,
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
  },
  /// Execute a program and print what it outputs.
  Run {
    program: PathBuf,
    #[arg(long, default_value_t = 10_000)]
    max_steps: u64,
    /// Values served to `in` instructions, e.g. `--input 1,2,3`.
    #[arg(long, value_delimiter = ',')]
    input: Vec<u8>,
    /// Treat PROGRAM as source text and compile it first.
    #[arg(long)]
    source: bool,
  },
  /// Print a disassembly listing of a binary.
  Disasm { program: PathBuf },
  /// Assemble a fixture and compare its run against an expectation file.
  Check { source: PathBuf, expect: PathBuf },
}

#[derive(Debug, Snafu)]
enum CliError {
  #[snafu(display("could not read {}: {source}", path.display()))]
  Read { path: PathBuf, source: io::Error },
  #[snafu(display("could not write {}: {source}", path.display()))]
  Write { path: PathBuf, source: io::Error },
  #[snafu(display("{}: {source}", path.display()))]
  Compile { path: PathBuf, source: CompileError },
  #[snafu(display("{}: {source}", path.display()))]
  Assemble { path: PathBuf, source: AsmError },
  #[snafu(display("{}: {source}", path.display()))]
  Fixture { path: PathBuf, source: FixtureError },
  #[snafu(display("{}: fixture failed: {reasons}", path.display()))]
  FixtureFailed { path: PathBuf, reasons: String },
}

type CliResult<T> = Result<T, CliError>;

fn read_text(path: &Path) -> CliResult<String> {
  fs::read_to_string(path).context(ReadSnafu { path })
}

fn write_file(path: &Path, contents: impl AsRef<[u8]>) -> CliResult<()> {
  fs::write(path, contents).context(WriteSnafu { path })?;
  info!("wrote {}", path.display());
  Ok(())
}

fn is_stdout(path: &Path) -> bool {
  path.as_os_str() == "-"
}

/// `out.o` -> `out.o.asm`, keeping the full output name.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
  let mut name = path.as_os_str().to_owned();
  name.push(suffix);
  PathBuf::from(name)
}

fn hex_dump(bytes: &[u8]) -> String {
  bytes
    .chunks(16)
    .map(|chunk| {
      let line: Vec<String> = chunk.iter().map(|b| format!("{b:02X}")).collect();
      line.join(" ") + "\n"
    })
    .collect()
}

fn compile_file(source: &Path, output: Option<PathBuf>, emit_asm: bool, listing: bool) -> CliResult<()> {
  let text = read_text(source)?;
  let compiled = compile(&text).context(CompileSnafu { path: source })?;
  let assembly = ir::to_text(&compiled.assembly).join("\n") + "\n";
  info!(
    "compiled {} to {} bytes",
    source.display(),
    compiled.machine_code.len()
  );

  let output = output.unwrap_or_else(|| source.with_extension("o"));
  if is_stdout(&output) {
    if emit_asm {
      println!("{assembly}");
    }
    print!("{}", hex_dump(&compiled.machine_code));
    print!("\n{}", disasm::listing(&compiled.machine_code));
    return Ok(());
  }

  write_file(&output, &compiled.machine_code)?;
  if emit_asm {
    write_file(&sibling(&output, ".asm"), &assembly)?;
  }
  if listing {
    write_file(
      &sibling(&output, ".txt"),
      disasm::listing(&compiled.machine_code),
    )?;
  }
  Ok(())
}

fn assemble_file(source: &Path, output: Option<PathBuf>) -> CliResult<()> {
  let text = read_text(source)?;
  let bytes = assemble_source(&text).context(AssembleSnafu { path: source })?;
  info!("assembled {} to {} bytes", source.display(), bytes.len());

  let output = output.unwrap_or_else(|| source.with_extension("o"));
  if is_stdout(&output) {
    print!("{}", hex_dump(&bytes));
    return Ok(());
  }
  write_file(&output, &bytes)
}

fn run_program(path: &Path, max_steps: u64, input: Vec<u8>, from_source: bool) -> CliResult<()> {
  let program = if from_source {
    let text = read_text(path)?;
    compile(&text)
      .context(CompileSnafu { path })?
      .machine_code
  } else {
    fs::read(path).context(ReadSnafu { path })?
  };
  debug!(
    "loaded {} bytes from {}:\n{}",
    program.len(),
    path.display(),
    disasm::listing(&program)
  );

  let mut vm = Vm::new();
  vm.load_program(&program);
  vm.set_output_callback(|value| println!("{value}"));
  let mut input = input.into_iter();
  vm.set_input_callback(move || input.next().unwrap_or(0));

  match vm.run(max_steps) {
    RunOutcome::Halted { steps } => info!("halted after {steps} steps"),
    RunOutcome::StepLimit { steps } => warn!("stopped at the {steps} step limit without halting"),
  }
  Ok(())
}

fn disassemble_file(path: &Path) -> CliResult<()> {
  let bytes = fs::read(path).context(ReadSnafu { path })?;
  print!("{}", disasm::listing(&bytes));
  Ok(())
}

fn check_fixture(source: &Path, expect: &Path) -> CliResult<()> {
  let text = read_text(source)?;
  let expectation = Expectation::parse(&read_text(expect)?).context(FixtureSnafu { path: expect })?;
  let report = fixture::check_source(&text, &expectation).context(FixtureSnafu { path: source })?;

  if !report.passed() {
    return FixtureFailedSnafu {
      path: source,
      reasons: report.failures().join("; "),
    }
    .fail();
  }
  info!("{}: ok ({} steps)", source.display(), report.steps);
  Ok(())
}

fn run(cli: Cli) -> CliResult<()> {
  match cli.command {
    Command::Compile {
      source,
      output,
      emit_asm,
      listing,
    } => compile_file(&source, output, emit_asm, listing),
    Command::Assemble { source, output } => assemble_file(&source, output),
    Command::Run {
      program,
      max_steps,
      input,
      source,
    } => run_program(&program, max_steps, input, source),
    Command::Disasm { program } => disassemble_file(&program),
    Command::Check { source, expect } => check_fixture(&source, &expect),
  }
}

fn main() {
  let cli = Cli::parse();
  let verbosity = if cli.quiet {
    -1
  } else {
    i8::try_from(cli.verbose).unwrap_or(i8::MAX)
  };
  log::set_level(Level::from_verbosity(verbosity));

  if let Err(err) = run(cli) {
    error!("{err}");
    process::exit(1);
  }
}
