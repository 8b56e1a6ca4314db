use std::{
    fs::File,
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    process,
    time::Instant,
};

use clap::Parser;
use hmmtag::{pipeline, Dataset, Evaluation, HmmModel};

/// Assign the most probable tag to every token of the input, one sentence per line.
/// INPUT and OUTPUT may be '-' for STDIN and STDOUT.
#[derive(Debug, Parser)]
#[command(name = "hmmtag", version)]
struct Argv {
    /// read whitespace-separated sentences from a file (INPUT)
    #[arg(value_name = "INPUT")]
    input: PathBuf,
    /// read the model from a file (MODEL)
    #[arg(value_name = "MODEL")]
    model: PathBuf,
    /// write token/tag lines to a file (OUTPUT)
    #[arg(value_name = "OUTPUT", default_value = "-")]
    output: PathBuf,
    /// number of worker threads
    #[arg(short, long, default_value_t = 1)]
    jobs: usize,
    /// treat INPUT as token/tag lines and report the performance of the model
    #[arg(short = 't', long = "test")]
    evaluate: bool,
    /// suppress tagging results (useful for test mode)
    #[arg(short, long)]
    quiet: bool,
    /// print the performance summary as JSON (with -t)
    #[arg(long)]
    json: bool,
}

fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == "-"
}

fn open_input(path: &Path) -> io::Result<Box<dyn BufRead>> {
    if is_stdio(path) {
        Ok(Box::new(io::stdin().lock()))
    } else {
        Ok(Box::new(BufReader::new(File::open(path)?)))
    }
}

fn open_output(path: &Path) -> io::Result<Box<dyn Write>> {
    if is_stdio(path) {
        Ok(Box::new(BufWriter::new(io::stdout().lock())))
    } else {
        Ok(Box::new(BufWriter::new(File::create(path)?)))
    }
}

fn run(argv: &Argv) -> hmmtag::Result<()> {
    let begin = Instant::now();
    log::info!("reading model {:?}", argv.model);
    let model = HmmModel::from_path(&argv.model)?;
    let tagger = model.tagger();

    log::info!("tagging {:?}", argv.input);
    let input = open_input(&argv.input)?;
    let ds = if argv.evaluate {
        Dataset::read_labeled(input)?
    } else {
        Dataset::read(input)?
    };
    let prediction = pipeline::tag_dataset(&tagger, &ds, argv.jobs)?;

    if !argv.quiet {
        log::info!("writing {:?}", argv.output);
        pipeline::write_tagged(open_output(&argv.output)?, &ds, &prediction)?;
    }

    if argv.evaluate {
        let mut evaluation = Evaluation::new(model.num_labels());
        for (seq, tags) in ds.seqs.iter().zip(&prediction) {
            evaluation.accumulate(&seq.labels, tags);
        }
        let estimation = evaluation.evaluate();
        if argv.json {
            let json = serde_json::to_string_pretty(&estimation).map_err(io::Error::from)?;
            println!("{json}");
        } else {
            println!("{evaluation}");
        }
    }

    let elapsed = begin.elapsed();
    log::info!(
        "took: {:?} ({:.1} sentences/sec)",
        elapsed,
        ds.len() as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
    );
    Ok(())
}

fn main() {
    env_logger::init();
    let argv = Argv::parse();
    log::debug!("{:?}", argv);
    if let Err(e) = run(&argv) {
        log::error!("{e}");
        eprintln!("hmmtag: {e}");
        process::exit(1);
    }
}
