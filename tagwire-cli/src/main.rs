use std::collections::VecDeque;
use std::error::Error;
use std::fs;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tagwire::json::{from_json, to_json, JsonOptions};
use tagwire::{
    encode, DecodeError, DecodeObserver, DecodeOptions, Decoder, MessageDescriptor, Record,
    Schema, Tag, Utf8Mode,
};
use tagwire_bench::{format_throughput, BenchStats};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod input;
mod inspect;

use input::read_input;
use inspect::inspect;

const DEFAULT_BENCH_ITERATIONS: usize = 200_000;

enum Command {
    Decode { file: String },
    Encode { json_file: String, out_file: String },
    Bench { file: String },
    Inspect { file: String },
}

struct Args {
    command: Command,

    /// Path to a JSON schema document or a compiled descriptor set.
    schema: Option<String>,

    /// Name of the message type to decode or encode.
    message: Option<String>,

    /// Number of decode iterations for `bench`.
    iterations: usize,

    /// Replace invalid UTF-8 in strings instead of failing.
    lossy_utf8: bool,

    /// Include absent fields in JSON output.
    emit_defaults: bool,

    /// Memory-map input files instead of reading them.
    mmap: bool,

    /// Enable verbose logging.
    verbose: bool,
}

impl Args {
    fn schema(&self) -> Result<Schema, Box<dyn Error>> {
        let path = self.schema.as_deref().ok_or("missing `--schema` arg")?;
        let schema = if path.ends_with(".json") {
            Schema::from_json(&fs::read_to_string(path)?)?
        } else {
            Schema::from_descriptor_set(&fs::read(path)?)?
        };
        Ok(schema)
    }

    fn message(&self) -> Result<&str, Box<dyn Error>> {
        Ok(self.message.as_deref().ok_or("missing `--message` arg")?)
    }

    fn decode_options(&self) -> DecodeOptions {
        let opts = DecodeOptions::from_env();
        if self.lossy_utf8 {
            opts.with_utf8(Utf8Mode::Lossy)
        } else {
            opts
        }
    }
}

fn parse_args() -> Result<Args, lexopt::Error> {
    use lexopt::prelude::*;

    let mut values = VecDeque::new();
    let mut schema = None;
    let mut message = None;
    let mut iterations = DEFAULT_BENCH_ITERATIONS;
    let mut lossy_utf8 = false;
    let mut emit_defaults = false;
    let mut mmap = false;
    let mut verbose = false;

    let mut parser = lexopt::Parser::from_env();
    while let Some(arg) = parser.next()? {
        match arg {
            Value(val) => values.push_back(val.string()?),
            Short('s') | Long("schema") => schema = Some(parser.value()?.string()?),
            Short('m') | Long("message") => message = Some(parser.value()?.string()?),
            Short('n') | Long("iterations") => iterations = parser.value()?.parse()?,
            Long("lossy-utf8") => lossy_utf8 = true,
            Short('d') | Long("defaults") => emit_defaults = true,
            Long("mmap") => mmap = true,
            Short('v') | Long("verbose") => verbose = true,
            Short('h') | Long("help") => {
                println!(
                    "Decode, encode and inspect tagwire messages.

Usage:
  {bin_name} decode --schema <schema> --message <name> [OPTIONS] <file>
  {bin_name} encode --schema <schema> --message <name> <json_file> <out_file>
  {bin_name} bench --schema <schema> --message <name> [-n <iterations>] <file>
  {bin_name} inspect <file>

Options:
  -s, --schema <path>     JSON schema document (.json) or protoc descriptor set
  -m, --message <name>    Message type
  -n, --iterations <n>    Decode iterations for `bench` (default {default_iters})
  -d, --defaults          Include absent fields in JSON output
      --lossy-utf8        Replace invalid UTF-8 in strings instead of failing
      --mmap              Memory-map input files
  -v, --verbose           Enable verbose logging
  -h, --help              Print help

Decode options can also be set with the TAGWIRE_DECODE env var, eg.
TAGWIRE_DECODE=\"recursion-limit=20 lossy-utf8=1\".
",
                    bin_name = parser.bin_name().unwrap_or("tagwire"),
                    default_iters = DEFAULT_BENCH_ITERATIONS,
                );
                std::process::exit(0);
            }
            _ => return Err(arg.unexpected()),
        }
    }

    let command_name = values.pop_front().ok_or("missing command")?;
    let mut positional = |name: &str| {
        values
            .pop_front()
            .ok_or_else(|| lexopt::Error::from(format!("missing `<{}>` arg", name)))
    };
    let command = match command_name.as_str() {
        "decode" => Command::Decode {
            file: positional("file")?,
        },
        "encode" => Command::Encode {
            json_file: positional("json_file")?,
            out_file: positional("out_file")?,
        },
        "bench" => Command::Bench {
            file: positional("file")?,
        },
        "inspect" => Command::Inspect {
            file: positional("file")?,
        },
        other => return Err(format!("unknown command \"{}\"", other).into()),
    };

    Ok(Args {
        command,
        schema,
        message,
        iterations,
        lossy_utf8,
        emit_defaults,
        mmap,
        verbose,
    })
}

/// Install a subscriber which logs to stderr.
///
/// The level is `warn`, or `debug` in verbose mode. `RUST_LOG` overrides
/// both.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Counts fields seen while decoding.
#[derive(Default)]
struct FieldCounter {
    known: AtomicU64,
    unknown: AtomicU64,
}

impl DecodeObserver for FieldCounter {
    fn field_decoded(&self, _message: &MessageDescriptor, _tag: Tag, known: bool) {
        let counter = if known { &self.known } else { &self.unknown };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn decode_finished(
        &self,
        message: &MessageDescriptor,
        input_len: usize,
        result: Result<&Record, &DecodeError>,
    ) {
        if let Err(err) = result {
            tracing::warn!(message_type = message.name(), input_len, "decode failed: {}", err);
        }
    }
}

fn print_json(record: &Record, emit_defaults: bool) -> Result<(), Box<dyn Error>> {
    let json = to_json(record, &JsonOptions { emit_defaults });
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

fn run_decode(args: &Args, file: &str) -> Result<(), Box<dyn Error>> {
    let schema = args.schema()?;
    let input = read_input(file, args.mmap)?;
    let record = Decoder::new(&schema)
        .with_options(args.decode_options())
        .decode(args.message()?, &input)?;
    print_json(&record, args.emit_defaults)
}

fn run_encode(args: &Args, json_file: &str, out_file: &str) -> Result<(), Box<dyn Error>> {
    let schema = args.schema()?;
    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(json_file)?)?;
    let record = from_json(&schema, args.message()?, &json)?;
    let buf = encode(&schema, &record)?;
    fs::write(out_file, &buf)?;
    println!("Wrote {} bytes to {}", buf.len(), out_file);
    Ok(())
}

/// Decode the same input repeatedly and report timing statistics.
fn run_bench(args: &Args, file: &str) -> Result<(), Box<dyn Error>> {
    let schema = args.schema()?;
    let message = args.message()?;
    let input = read_input(file, args.mmap)?;

    let counter = FieldCounter::default();
    let decoder = Decoder::new(&schema)
        .with_options(args.decode_options())
        .with_observer(&counter);

    let mut times = Vec::with_capacity(args.iterations);
    let start = Instant::now();
    for i in 0..args.iterations {
        let iter_start = Instant::now();
        let record = decoder
            .decode(message, &input)
            .map_err(|err| format!("decode failed on iteration {}: {}", i, err))?;
        times.push((iter_start.elapsed().as_secs_f64() * 1000.0) as f32);

        if i == 0 {
            let json = to_json(&record, &JsonOptions::default());
            info!("first record: {}", json);
        }
    }
    let elapsed = start.elapsed();
    let stats = BenchStats::from_times(times);

    println!(
        "Decoded {} x {} bytes in {:.3}s ({})",
        args.iterations,
        input.len(),
        elapsed.as_secs_f64(),
        format_throughput(input.len() as u64 * args.iterations as u64, elapsed),
    );
    println!(
        "Per iteration: mean {:.2}us median {:.2}us min {:.2}us max {:.2}us",
        stats.mean * 1000.,
        stats.median * 1000.,
        stats.min * 1000.,
        stats.max * 1000.,
    );
    if args.iterations > 0 {
        println!(
            "Fields per message: {} known, {} unknown",
            counter.known.load(Ordering::Relaxed) / args.iterations as u64,
            counter.unknown.load(Ordering::Relaxed) / args.iterations as u64,
        );
    }
    Ok(())
}

fn run_inspect(args: &Args, file: &str) -> Result<(), Box<dyn Error>> {
    let input = read_input(file, args.mmap)?;
    println!("{} bytes", input.len());
    for line in inspect(&input)? {
        println!("{}", line);
    }
    Ok(())
}

/// Tool for decoding, encoding and inspecting binary messages.
///
/// ```
/// cargo run -p tagwire-cli --release -- decode --schema user.json --message User user.bin
/// ```
///
/// Set `RUST_LOG=tagwire=trace` to log each skipped unknown field.
fn main() -> Result<(), Box<dyn Error>> {
    let args = parse_args()?;
    init_logging(args.verbose);

    let start = Instant::now();
    match &args.command {
        Command::Decode { file } => run_decode(&args, file)?,
        Command::Encode {
            json_file,
            out_file,
        } => run_encode(&args, json_file, out_file)?,
        Command::Bench { file } => run_bench(&args, file)?,
        Command::Inspect { file } => run_inspect(&args, file)?,
    }
    log_elapsed(start.elapsed());

    Ok(())
}

fn log_elapsed(elapsed: Duration) {
    tracing::debug!("finished in {:.3}ms", elapsed.as_secs_f64() * 1000.);
}
