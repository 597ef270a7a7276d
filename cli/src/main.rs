use std::path::PathBuf;

use clap::Parser;
use fatsort_core::collator::AsciiCollator;
use fatsort_core::device::{FileDevice, SectorCache};
use fatsort_core::options::{GroupOrder, OrderFunction, SortOptions};
use fatsort_core::selection::{PathLists, RegexLists, Selection};
use regex::Regex;

/// Sorts the directory entries of a FAT-family volume in place so that any
/// consumer enumerating the directory sees files in a chosen order.
#[derive(Parser)]
#[command(name = "fatsort", version, about, long_about = None)]
struct Cli {
    /// Path to the device or image file to sort
    device: PathBuf,

    /// Report what would be sorted without writing anything
    #[arg(short = 'l', long = "list-only")]
    list_only: bool,

    /// Report volume geometry and exit
    #[arg(short = 'i', long = "info")]
    info: bool,

    /// Report volume geometry plus allocation-bitmap details and exit
    #[arg(short = 'm', long = "more-info")]
    more_info: bool,

    /// Open the volume even if a mount check would refuse it
    #[arg(short = 'f', long = "force")]
    force: bool,

    /// Fold names to lowercase before comparing
    #[arg(short = 'c', long = "ignore-case")]
    ignore_case: bool,

    /// Use byte-wise comparison instead of locale collation
    #[arg(short = 'a', long = "ascii")]
    ascii: bool,

    /// Use natural-order comparison (numeric runs compare by value)
    #[arg(short = 'n', long = "natural-sort")]
    natural: bool,

    /// Grouping precedence for directories vs. files
    #[arg(short = 'o', long = "order", value_enum, default_value_t = OrderArg::DirsFirst)]
    order: OrderArg,

    /// Reverse the comparator's result
    #[arg(short = 'r', long = "reverse")]
    reverse: bool,

    /// Ignore the comparator; permute the non-anchored entries at random
    #[arg(short = 'R', long = "random")]
    random: bool,

    /// Seed for `--random`'s Fisher-Yates permutation (deterministic if set)
    #[arg(long = "random-seed", default_value_t = 0)]
    random_seed: u64,

    /// Sort by last-modification time instead of name
    #[arg(short = 't', long = "modification-time")]
    modification_time: bool,

    /// Prefix to strip (case-insensitively) before comparing; repeatable
    #[arg(short = 'I', long = "ignore-prefix")]
    ignore_prefix: Vec<String>,

    /// Only sort this directory (repeatable)
    #[arg(short = 'd', long = "include-dir")]
    include_dir: Vec<String>,

    /// Only sort this directory and its subdirectories (repeatable)
    #[arg(short = 'D', long = "include-dir-recursive")]
    include_dir_recursive: Vec<String>,

    /// Never sort this directory (repeatable)
    #[arg(short = 'x', long = "exclude-dir")]
    exclude_dir: Vec<String>,

    /// Never sort this directory or its subdirectories (repeatable)
    #[arg(short = 'X', long = "exclude-dir-recursive")]
    exclude_dir_recursive: Vec<String>,

    /// Only sort directories whose path matches this regex (repeatable)
    #[arg(short = 'e', long = "include-regex")]
    include_regex: Vec<String>,

    /// Never sort directories whose path matches this regex (repeatable)
    #[arg(short = 'E', long = "exclude-regex")]
    exclude_regex: Vec<String>,

    /// Locale name for collation (only meaningful without --ascii/--natural-sort)
    #[arg(short = 'L', long = "locale")]
    locale: Option<String>,
}

#[derive(Copy, Clone, Debug, clap::ValueEnum)]
enum OrderArg {
    #[value(name = "d")]
    DirsFirst,
    #[value(name = "f")]
    FilesFirst,
    #[value(name = "a")]
    Mixed,
}

fn build_selection(cli: &Cli) -> anyhow::Result<Selection> {
    let path_list_mode = !cli.include_dir.is_empty()
        || !cli.include_dir_recursive.is_empty()
        || !cli.exclude_dir.is_empty()
        || !cli.exclude_dir_recursive.is_empty();
    let regex_mode = !cli.include_regex.is_empty() || !cli.exclude_regex.is_empty();

    if path_list_mode && regex_mode {
        anyhow::bail!("--include-dir/--exclude-dir options cannot be combined with --include-regex/--exclude-regex");
    }

    if regex_mode {
        let compile = |patterns: &[String]| -> anyhow::Result<Vec<Regex>> {
            patterns.iter().map(|p| Ok(Regex::new(p)?)).collect()
        };
        return Ok(Selection::Regex(RegexLists {
            include: compile(&cli.include_regex)?,
            exclude: compile(&cli.exclude_regex)?,
        }));
    }

    if path_list_mode {
        return Ok(Selection::PathLists(PathLists {
            include: cli.include_dir.clone(),
            include_recursive: cli.include_dir_recursive.clone(),
            exclude: cli.exclude_dir.clone(),
            exclude_recursive: cli.exclude_dir_recursive.clone(),
        }));
    }

    Ok(Selection::All)
}

fn build_options(cli: &Cli) -> SortOptions {
    let order = match cli.order {
        OrderArg::DirsFirst => GroupOrder::DirsFirst,
        OrderArg::FilesFirst => GroupOrder::FilesFirst,
        OrderArg::Mixed => GroupOrder::Mixed,
    };
    let order_function = if cli.natural {
        OrderFunction::Natural
    } else if cli.ascii {
        OrderFunction::Ascii
    } else {
        OrderFunction::Locale
    };

    SortOptions {
        order,
        order_function,
        reverse: cli.reverse,
        ignore_case: cli.ignore_case,
        modification_time: cli.modification_time,
        ignore_prefixes: cli.ignore_prefix.clone(),
        random: cli.random,
        list_only: cli.list_only || cli.info || cli.more_info,
        force: cli.force,
        random_seed: cli.random_seed,
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    if let Some(locale) = &cli.locale {
        log::warn!(
            "--locale={} requested but no locale-collation backend is wired up; falling back to ASCII order",
            locale
        );
    }

    let selection = build_selection(&cli)?;
    let opts = build_options(&cli);
    let collator = AsciiCollator;

    let file = FileDevice::open(&cli.device, !opts.list_only)
        .map_err(|e| anyhow::anyhow!("failed to open {}: {}", cli.device.display(), e))?;
    let mut device = SectorCache::new(file, 512);

    let report = fatsort_engine::sort_volume(&mut device, &opts, &selection, &collator)?;

    if cli.info || cli.more_info {
        if let Some(geometry) = &report.geometry {
            println!("volume kind:          {:?}", geometry.kind);
            println!("sector size:          {} bytes", geometry.sector_size);
            println!("cluster size:         {} bytes", geometry.cluster_size);
            println!("FAT copies:           {}", geometry.fat_count);
            println!("cluster count:        {}", geometry.cluster_count);
        }
    }

    if cli.more_info {
        match report.allocation_bitmap {
            Some((first_cluster, length_bytes)) => {
                println!("allocation bitmap:    cluster {}, {} bytes", first_cluster, length_bytes);
            }
            None => println!("allocation bitmap:    none found"),
        }
    }

    if cli.list_only {
        for (path, names) in &report.entries {
            println!("{}", path);
            for name in names {
                println!("  {}", name);
            }
        }
    }

    log::info!(
        "visited {} directories, rewrote {}",
        report.directories_visited,
        report.directories_written
    );

    Ok(())
}
