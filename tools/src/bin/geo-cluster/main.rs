use anyhow::Context as _;
use anyhow::Result;
use geocluster::Algorithm;
use std::env;

const USAGE: &str = "Usage: geo-cluster [options] [in.csv [out.json]] <in.csv >out.json";

fn main() -> Result<()> {
    let mut options = getopts::Options::new();
    options.optflag("h", "help", "print this help menu");
    options.optopt(
        "a",
        "algorithm",
        "name of the algorithm to run, see ALGORITHMS",
        "NAME",
    );
    options.optopt("r", "radius", "neighborhood radius, in kilometers", "KM");
    options.optopt(
        "n",
        "min-size",
        "minimum number of locations in a cluster",
        "COUNT",
    );
    options.optopt(
        "j",
        "threads",
        "number of worker threads (default: one per core)",
        "COUNT",
    );
    options.optopt("t", "trace", "emit a chrome trace", "FILE");
    options.optflag("v", "verbose", "print ignored rows and labels");

    let matches = options.parse(env::args().skip(1))?;

    if matches.opt_present("h") {
        eprintln!("{}", options.usage(USAGE));
        eprint!(include_str!("help_after.txt"));
        return Ok(());
    }
    if matches.free.len() > 2 {
        anyhow::bail!("too many arguments\n\n{}", options.usage(USAGE));
    }

    let _chrome_trace_guard = geocluster_tools::init_tracing(matches.opt_str("t"));

    let algorithm: Algorithm = matches
        .opt_get("a")
        .context("invalid value for option 'algorithm'")?
        .context("missing required option 'algorithm'")?;
    let radius_km: f64 = matches
        .opt_get("r")
        .context("invalid value for option 'radius'")?
        .context("missing required option 'radius'")?;
    let min_size: usize = matches
        .opt_get("n")
        .context("invalid value for option 'min-size'")?
        .context("missing required option 'min-size'")?;
    let thread_count: Option<usize> = matches
        .opt_get("j")
        .context("invalid value for option 'threads'")?;
    let verbose = matches.opt_present("v");

    let input = geocluster_tools::reader(matches.free.first())?;
    let table = geocluster_tools::read_table(input).context("failed to read location table")?;

    let cluster = || geocluster::cluster_locations(&table, algorithm, radius_km, min_size);
    let result = match thread_count {
        Some(thread_count) => rayon::ThreadPoolBuilder::new()
            .num_threads(thread_count)
            .build()
            .context("failed to build thread pool")?
            .install(cluster),
        None => cluster(),
    }
    .with_context(|| format!("failed to apply algorithm {algorithm}"))?;

    if verbose {
        if !result.invalid_rows().is_empty() {
            eprint!("{}", result.invalid_report());
        }
        eprintln!("{}", result.labels_display());
    }

    let output = geocluster_tools::writer(matches.free.get(1))?;
    geocluster_tools::write_clusters(output, result.clusters())
        .context("failed to print clusters")?;

    Ok(())
}
