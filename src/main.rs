// main.rs - CLI entry point

use mlstcall::cli::{Args, CallArgs, Command, Config, TabulateArgs, UpdateArgs, ValidationResult};
use mlstcall::cli::validate_args;
use mlstcall::core::update_directory;
use mlstcall::data::genome::index_genome_dir;
use mlstcall::output::{is_stdout, tabulate_directory, write_text, BatchSummary};
use mlstcall::output::TabulateOptions;
use mlstcall::search::SearchRegistry;
use mlstcall::{AlleleDatabase, CallingEngine};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;

fn main() {
    if let Err(e) = run_main() {
        eprintln!("❌ ERROR: {}", e);
        std::process::exit(1);
    }
}

/// Log to stderr as `YYYY-mm-dd HH:MM LEVEL message`
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("mlstcall=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mlstcall=info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M".to_string()))
        .with_writer(std::io::stderr)
        .init();
}

/// Status lines go to stderr when stdout carries the result
fn status(stdout_busy: bool, line: &str) {
    if stdout_busy {
        eprintln!("{}", line);
    } else {
        println!("{}", line);
    }
}

fn print_summary(stdout_busy: bool, summary: &BatchSummary) {
    let icon = if summary.has_failures() { "⚠️ " } else { "✅" };
    status(stdout_busy, &format!("{} {}", icon, summary.report()));
}

fn run_main() -> Result<(), String> {
    let args: Args = argh::from_env();

    // Handle generate config first
    if args.generate_config {
        let sample_config = Config::generate_sample();
        println!("{}", sample_config);
        println!("\n💡 Save this content to a .toml file and use --config /path/to/config.toml");
        return Ok(());
    }

    let command = args
        .command
        .as_ref()
        .ok_or("a subcommand is required: call, update or tabulate")?;

    init_logging(args.verbose);

    let settings = args.load_settings()?;
    let validation = validate_args(&args, &settings)?;

    // Configure thread pool
    if let Some(n) = validation.config.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .map_err(|e| format!("Failed to configure thread pool: {}", e))?;
    }

    let stdout_busy = match command {
        Command::Call(call) => is_stdout(call.output.as_deref()),
        Command::Tabulate(tabulate) => is_stdout(tabulate.output.as_deref()),
        Command::Update(_) => false,
    };
    status(
        stdout_busy,
        &format!("🧬 mlstcall v{} - {}", mlstcall::VERSION, command.name()),
    );
    status(
        stdout_busy,
        &format!("🧵 Threads: {}", rayon::current_num_threads()),
    );

    let start = Instant::now();
    match command {
        Command::Call(call) => run_call(call, &validation, stdout_busy)?,
        Command::Update(update) => run_update(update, &validation)?,
        Command::Tabulate(tabulate) => run_tabulate(tabulate, &validation, stdout_busy)?,
    }
    status(
        stdout_busy,
        &format!("⏱️  Completed in {:.2}s", start.elapsed().as_secs_f64()),
    );
    Ok(())
}

fn keeps_locus(validation: &ValidationResult, locus: &str) -> bool {
    validation
        .loci_include_regex
        .as_ref()
        .map_or(true, |re| re.is_match(locus))
        && !validation
            .loci_exclude_regex
            .as_ref()
            .map_or(false, |re| re.is_match(locus))
}

fn run_call(call: &CallArgs, validation: &ValidationResult, stdout_busy: bool) -> Result<(), String> {
    let config = &validation.config;
    let input = Path::new(&call.input);
    let batch_input = input.is_dir();

    // Where each genome's record goes: a directory, a single file, or stdout
    let output_dir = match call.output.as_deref() {
        Some(out) if !is_stdout(Some(out)) && (batch_input || Path::new(out).is_dir() || out.ends_with('/')) => {
            Some(PathBuf::from(out))
        }
        _ if batch_input => {
            return Err("--output must name a directory when --input is a directory".to_string())
        }
        _ => None,
    };

    let registry = SearchRegistry::new(&config.alignment);
    let adapter = registry
        .get_adapter(&config.search)
        .ok_or_else(|| format!("Unknown search adapter '{}'", config.search))?;

    let db = AlleleDatabase::from_directory(Path::new(&call.alleles)).map_err(|e| e.to_string())?;
    let loci: Vec<String> = db
        .locus_names()
        .into_iter()
        .filter(|locus| keeps_locus(validation, locus))
        .collect();
    if loci.is_empty() {
        return Err("No loci left to call after applying locus filters".to_string());
    }

    let genome_paths: Vec<PathBuf> = if batch_input {
        index_genome_dir(input)
            .map_err(|e| e.to_string())?
            .into_values()
            .collect()
    } else {
        vec![input.to_path_buf()]
    };
    if genome_paths.is_empty() {
        return Err(format!("No genome FASTA files found in {}", input.display()));
    }

    status(
        stdout_busy,
        &format!(
            "🔎 Search: {} ({} loci, {} alleles, {} genomes)",
            adapter.name(),
            loci.len(),
            db.total_alleles(),
            genome_paths.len()
        ),
    );

    let engine = CallingEngine::new(adapter, config.call_options());
    let (results, mut summary) = engine.call_batch(&genome_paths, &db, &loci);

    for (path, result) in results {
        let Ok(record) = result else { continue };
        let counts: Vec<String> = record
            .count_by_label()
            .iter()
            .map(|(label, n)| format!("{} {}", n, label))
            .collect();
        status(stdout_busy, &format!("📋 {}: {}", record.genome, counts.join(", ")));
        let written = match &output_dir {
            Some(dir) => {
                let target = dir.join(format!("{}.json", record.genome));
                record.to_json_file(&target)
            }
            None if is_stdout(call.output.as_deref()) => record.write_json(std::io::stdout().lock()),
            None => record.to_json_file(Path::new(call.output.as_deref().unwrap_or("-"))),
        };
        if let Err(e) = written {
            summary.fail(path.display().to_string(), e.to_string());
        }
    }

    print_summary(stdout_busy, &summary);
    Ok(())
}

fn run_update(update: &UpdateArgs, validation: &ValidationResult) -> Result<(), String> {
    let options = validation.config.update_options();
    println!(
        "🔧 Extension threshold: {} bp, auto-append novel alleles: {}",
        options.threshold, options.auto_append_novel
    );

    let outcome = update_directory(
        Path::new(&update.json),
        Path::new(&update.alleles),
        Path::new(&update.genomes),
        options,
    )
    .map_err(|e| e.to_string())?;

    println!("🧩 Partial calls extended: {}", outcome.extended);
    for (locus, ids) in &outcome.new_alleles {
        let ids: Vec<String> = ids.iter().map(u32::to_string).collect();
        println!("➕ {}: new alleles {}", locus, ids.join(", "));
    }
    for (locus, reason) in &outcome.append_failures {
        println!("⚠️  Could not append to {}: {}", locus, reason);
    }
    if !outcome.persisted.is_empty() {
        println!("💾 Allele files rewritten: {}", outcome.persisted.len());
    }

    print_summary(false, &outcome.summary);
    Ok(())
}

fn run_tabulate(tabulate: &TabulateArgs, validation: &ValidationResult, stdout_busy: bool) -> Result<(), String> {
    let options = TabulateOptions {
        delimiter: validation.delimiter,
        sentinels: validation.config.sentinels.clone(),
        include_loci: validation.loci_include_regex.clone(),
        exclude_loci: validation.loci_exclude_regex.clone(),
    };

    let (table, summary) = tabulate_directory(Path::new(&tabulate.json), &options).map_err(|e| e.to_string())?;
    write_text(tabulate.output.as_deref(), &table).map_err(|e| e.to_string())?;

    print_summary(stdout_busy, &summary);
    Ok(())
}
