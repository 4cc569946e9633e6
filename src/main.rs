use clap::{Args, Parser, Subcommand};
use colorsense_core::{
    CalibrationMatrix, ColorReading, ColorSenseError, ColorSource, Database, JsonFileStore,
    MatrixKind, Metric, ReferenceTarget, Rgb, SensorSample, SettingsStore,
    TuningSession, encode_sources, find_best_match_by, find_top_matches_by, transform,
};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "colorsense",
    version,
    about = "Build color tables, match colors and calibrate the color sensor"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a JSON color list into a binary table
    Encode {
        /// JSON array of {name, code, r, g, b, lrv, id, lightText}
        input: PathBuf,
        /// Binary table to write
        output: PathBuf,
    },

    /// List the header and records of a binary table
    Inspect {
        /// Binary table
        database: PathBuf,
        /// Print at most this many records
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Find the reference colors nearest to an RGB value
    Match {
        /// Binary table
        database: PathBuf,
        r: u8,
        g: u8,
        b: u8,
        /// Number of matches to list
        #[arg(long, default_value_t = 1)]
        top: usize,
        /// rgb or ciede2000
        #[arg(long, default_value = "rgb")]
        metric: Metric,
    },

    /// Convert a raw sensor sample to RGB
    Convert {
        #[command(flatten)]
        store: StoreArgs,
        #[command(flatten)]
        sample: SampleArgs,
        /// Also look the color up in this table
        #[arg(long)]
        database: Option<PathBuf>,
        /// Distance used for the table lookup: rgb or ciede2000
        #[arg(long, default_value = "rgb")]
        metric: Metric,
        /// Print the reading as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run one tuning cycle against a reference sample
    Tune {
        #[command(flatten)]
        store: StoreArgs,
        /// vivid-white, grey-port or R,G,B
        #[arg(long, default_value = "grey-port")]
        target: ReferenceTarget,
        #[command(flatten)]
        sample: SampleArgs,
        /// Apply and save every proposal instead of only listing them
        #[arg(long)]
        apply: bool,
    },

    /// Fit a calibration matrix to reference points
    Solve {
        #[command(flatten)]
        store: StoreArgs,
        /// JSON array of [{x, y, z, ir1, ir2}, {r, g, b}] pairs
        points: PathBuf,
        /// Write the result into this matrix: bright or dark
        #[arg(long)]
        save: Option<MatrixKind>,
    },

    /// Change one calibration setting
    Set {
        #[command(flatten)]
        store: StoreArgs,
        /// Setting key, e.g. darkMatrix0 or threshold
        key: String,
        value: String,
    },

    /// Print every calibration setting
    Show {
        #[command(flatten)]
        store: StoreArgs,
    },
}

#[derive(Args, Debug)]
struct StoreArgs {
    /// Calibration settings file
    #[arg(long, default_value = "calibration.json")]
    settings: PathBuf,
}

impl StoreArgs {
    fn open(&self) -> JsonFileStore {
        JsonFileStore::new(&self.settings)
    }
}

#[derive(Args, Debug)]
struct SampleArgs {
    x: u16,
    y: u16,
    z: u16,
    ir1: u16,
    ir2: u16,
}

impl From<&SampleArgs> for SensorSample {
    fn from(args: &SampleArgs) -> Self {
        SensorSample::new(args.x, args.y, args.z, args.ir1, args.ir2)
    }
}

fn main() -> Result<(), ColorSenseError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    debug!("{:?}", cli.command);

    match cli.command {
        Command::Encode { input, output } => encode_table(&input, &output),
        Command::Inspect { database, limit } => inspect(&database, limit),
        Command::Match {
            database,
            r,
            g,
            b,
            top,
            metric,
        } => match_color(&database, Rgb::new(r, g, b), top, metric),
        Command::Convert {
            store,
            sample,
            database,
            metric,
            json,
        } => convert(&store, (&sample).into(), database, metric, json),
        Command::Tune {
            store,
            target,
            sample,
            apply,
        } => tune(&store, target, (&sample).into(), apply),
        Command::Solve {
            store,
            points,
            save,
        } => solve(&store, &points, save),
        Command::Set { store, key, value } => {
            let store = store.open();
            let mut state = store.load()?;
            state.set(&key, &value)?;
            store.save(&state)?;
            println!("{key} = {}", state.get(&key)?);
            Ok(())
        }
        Command::Show { store } => {
            let state = store.open().load()?;
            for (key, value) in state.entries() {
                println!("{key:<26} {value}");
            }
            Ok(())
        }
    }
}

fn encode_table(input: &Path, output: &Path) -> Result<(), ColorSenseError> {
    let json = fs::read_to_string(input)?;
    let sources: Vec<ColorSource> = serde_json::from_str(&json)?;
    let encoded = encode_sources(&sources)?;
    fs::write(output, &encoded.bytes)?;

    for warning in &encoded.warnings {
        println!("warning: {warning}");
    }
    let saved = 100.0 * (1.0 - encoded.bytes.len() as f64 / json.len().max(1) as f64);
    println!(
        "Wrote {} records to {}: {} bytes JSON -> {} bytes binary ({saved:.1}% smaller)",
        sources.len(),
        output.display(),
        json.len(),
        encoded.bytes.len()
    );
    Ok(())
}

fn inspect(path: &Path, limit: Option<usize>) -> Result<(), ColorSenseError> {
    let db = Database::open_file(path)?;
    let header = db.header();
    println!(
        "{}: version {}, {} records declared, {} bytes",
        path.display(),
        header.version,
        header.count,
        db.byte_len()
    );

    let mut records = db.records();
    let mut shown = 0usize;
    for record in records.by_ref().take(limit.unwrap_or(usize::MAX)) {
        println!(
            "{:>8}  {:<10} {:<32} {} {} LRV {:>6}{}",
            record.id,
            record.code,
            record.name,
            record.rgb.to_hex(),
            record.rgb,
            record.lrv.to_string(),
            if record.light_text { "  light text" } else { "" }
        );
        shown += 1;
    }
    println!("{shown} records shown");
    if records.skipped() > 0 {
        println!("{} damaged records skipped", records.skipped());
    }
    Ok(())
}

fn match_color(path: &Path, rgb: Rgb, top: usize, metric: Metric) -> Result<(), ColorSenseError> {
    let db = Database::open_file(path)?;
    let matches = find_top_matches_by(rgb, db.records(), top.max(1), metric)?;
    for m in &matches {
        println!(
            "{:<10} {:<32} {} {metric} distance {:.2}",
            m.record.code,
            m.record.name,
            m.record.rgb,
            m.distance
        );
    }
    Ok(())
}

fn convert(
    store: &StoreArgs,
    sample: SensorSample,
    database: Option<PathBuf>,
    metric: Metric,
    json: bool,
) -> Result<(), ColorSenseError> {
    let state = store.open().load()?;
    let output = transform(&sample, &state);

    if json {
        let reading = ColorReading::new(&sample, output.rgb);
        println!("{}", serde_json::to_string_pretty(&reading)?);
    } else {
        println!(
            "RGB {} {} via {} (compensated X'={:.1} Y'={:.1} Z'={:.1})",
            output.rgb,
            output.rgb.to_hex(),
            output.path,
            output.compensated[0],
            output.compensated[1],
            output.compensated[2]
        );
    }

    if let Some(path) = database {
        let db = Database::open_file(path)?;
        let best = find_best_match_by(output.rgb, db.records(), metric)?;
        println!(
            "Nearest: {} {} {} ({metric} distance {:.2})",
            best.record.code, best.record.name, best.record.rgb, best.distance
        );
    }
    Ok(())
}

fn tune(
    store_args: &StoreArgs,
    target: ReferenceTarget,
    sample: SensorSample,
    apply: bool,
) -> Result<(), ColorSenseError> {
    let store = store_args.open();
    let mut state = store.load()?;
    let mut session = TuningSession::new(target);

    let reading = session.read(sample, &state)?;
    println!(
        "Observed {} via {}, target {}, error R{:+} G{:+} B{:+}",
        reading.output.rgb,
        reading.output.path,
        target,
        reading.error[0],
        reading.error[1],
        reading.error[2]
    );

    let proposals = session.propose()?;
    if proposals.is_empty() {
        println!("No adjustments needed");
        return session.cancel();
    }
    for (i, proposal) in proposals.iter().enumerate() {
        println!("  [{i}] {proposal}");
    }

    if !apply {
        println!("Run again with --apply to write these changes");
        return session.cancel();
    }

    session.confirm_all()?;
    let report = session.apply(&mut state, &store)?;
    for change in &report.applied {
        println!(
            "Applied {}: {} -> {}",
            change.proposal.key(),
            change.previous,
            change.value
        );
    }
    for (proposal, error) in &report.rejected {
        println!("Rejected {}: {error}", proposal.key());
    }
    Ok(())
}

fn solve(store_args: &StoreArgs, points: &Path, save: Option<MatrixKind>) -> Result<(), ColorSenseError> {
    let points: Vec<(SensorSample, Rgb)> = serde_json::from_str(&fs::read_to_string(points)?)?;
    let matrix = CalibrationMatrix::solve(&points)?;
    for row in 0..3 {
        println!(
            "[{:>10.6} {:>10.6} {:>10.6}]",
            matrix.get(row, 0),
            matrix.get(row, 1),
            matrix.get(row, 2)
        );
    }

    if let Some(kind) = save {
        let store = store_args.open();
        let mut state = store.load()?;
        *state.matrix_mut(kind) = matrix;
        store.save(&state)?;
        println!("Saved as {}0..8", kind.key_prefix());
    }
    Ok(())
}
