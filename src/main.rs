use animfit::cli::{Cli, Commands, ConstraintArgs, EngineArgs};
use animfit::{
    calculate_aspect_ratio, format_file_size, generate_output_path, BatchProcessor,
    OptimizeResponse, Optimizer, OptimizerConfig,
};
use clap::Parser;
use log::LevelFilter;
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logger; RUST_LOG still overrides
    env_logger::Builder::new()
        .filter_level(if cli.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .parse_default_env()
        .init();

    match cli.command {
        Commands::Optimize {
            input,
            output,
            constraints,
            engine,
        } => process_optimize(input, output, &constraints, &engine),
        Commands::Batch {
            input,
            output,
            constraints,
            engine,
            threads,
            max_memory_mb,
            recursive,
        } => process_batch(input, output, &constraints, &engine, threads, max_memory_mb, recursive),
        Commands::Info { input } => process_info(input),
    }
}

fn build_optimizer(engine: &EngineArgs) -> anyhow::Result<Optimizer> {
    let config = OptimizerConfig {
        algorithm: engine.algorithm.into(),
        scratch_root: engine.scratch_dir.clone(),
        encoder_speed: engine.speed,
        ..Default::default()
    };
    config.validate()?;

    Ok(Optimizer::new(config))
}

fn process_optimize(
    input: PathBuf,
    output: Option<PathBuf>,
    constraints: &ConstraintArgs,
    engine: &EngineArgs,
) -> anyhow::Result<ExitCode> {
    let output_path = generate_output_path(&input, output.as_deref(), "optimized");

    let request = constraints
        .to_params()
        .and_then(|params| Ok(params.into_request(&input, &output_path)?));

    let response = match request {
        Ok(request) => {
            let optimizer = build_optimizer(engine)?;
            match optimizer.optimize(&request) {
                Ok(report) => {
                    if report.result.is_success() {
                        log::info!("Optimized animation saved to: {}", output_path.display());
                    }
                    OptimizeResponse::from_report(&report)
                }
                Err(e) => OptimizeResponse::error(e),
            }
        }
        Err(e) => OptimizeResponse::error(e),
    };

    println!("{}", response.to_json());

    Ok(ExitCode::from(response.exit_code() as u8))
}

fn process_batch(
    input: PathBuf,
    output: PathBuf,
    constraints: &ConstraintArgs,
    engine: &EngineArgs,
    threads: usize,
    max_memory_mb: u64,
    recursive: bool,
) -> anyhow::Result<ExitCode> {
    let params = constraints.to_params()?;
    let optimizer = build_optimizer(engine)?;
    let processor = BatchProcessor::new(optimizer, params, threads)?
        .with_memory_budget(max_memory_mb.saturating_mul(1024 * 1024));

    let stats = processor.process_directory(&input, &output, recursive)?;

    println!(
        "Batch complete: {} optimized, {} awaiting approval, {} failed. {} -> {} ({:.1}% smaller). Output: {}",
        stats.succeeded,
        stats.approvals_required.len(),
        stats.failed,
        format_file_size(stats.total_size_before),
        format_file_size(stats.total_size_after),
        stats.savings_percent(),
        output.display()
    );

    for (path, percent) in &stats.approvals_required {
        println!(
            "  needs approval: {} (~{}% of frames would be dropped)",
            path.display(),
            percent
        );
    }

    for (path, error) in &stats.errors {
        println!("  failed: {}: {}", path.display(), error);
    }

    Ok(if stats.failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn process_info(input: PathBuf) -> anyhow::Result<ExitCode> {
    let optimizer = Optimizer::new(OptimizerConfig::default());
    let metadata = optimizer.probe(&input)?;
    let aspect_ratio = calculate_aspect_ratio(metadata.width, metadata.height);

    println!("=== Animation Information ===");
    println!("File: {}", input.display());
    println!("Size: {}", format_file_size(metadata.size_bytes));
    println!("Dimensions: {} x {} pixels", metadata.width, metadata.height);
    println!("Aspect Ratio: {:.2}:1", aspect_ratio);
    println!("Frames: {}", metadata.frame_count);

    Ok(ExitCode::SUCCESS)
}
