//! smre CLI - Run the SMRE denoiser against a raw image file.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use smre::{Array2, ChambollePockDriver, Parameters};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage(&args[0]);
        std::process::exit(1);
    }

    match args[1].as_str() {
        "denoise" => cmd_denoise(&args[2..]),
        "--example" => print_example_config(),
        "--help" | "-h" => print_usage(&args[0]),
        // Legacy: treat first arg as config path for backward compatibility.
        _ => {
            if args[1].ends_with(".json") {
                cmd_denoise(&args[1..]);
            } else {
                eprintln!("Unknown command: {}", args[1]);
                print_usage(&args[0]);
                std::process::exit(1);
            }
        }
    }
}

fn print_usage(program: &str) {
    eprintln!("smre - Statistical multiresolution image denoising");
    eprintln!();
    eprintln!("Usage: {} <command> [options]", program);
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  denoise <config.json> <input.f32> [output.f32]");
    eprintln!("                                  Denoise a raw little-endian f32 image");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --example                       Print an example parameters file");
    eprintln!("  --help, -h                      Show this help message");
    eprintln!();
    eprintln!("Legacy mode:");
    eprintln!(
        "  {} <config.json> <input.f32> [output.f32]   Same as 'denoise'",
        program
    );
    eprintln!();
    eprintln!("The input file must contain width*height f32 values in row-major order,");
    eprintln!("matching the width/height fields of the parameters file.");
}

fn cmd_denoise(args: &[String]) {
    if args.len() < 2 {
        eprintln!("Usage: smre denoise <config.json> <input.f32> [output.f32]");
        std::process::exit(1);
    }

    let config_path = PathBuf::from(&args[0]);
    let input_path = PathBuf::from(&args[1]);
    let output_path = args.get(2).map(PathBuf::from);

    let params = load_params(&config_path);
    let noisy = load_image(&input_path, params.width, params.height);

    println!("smre denoiser");
    println!("=============");
    print_params_info(&params);
    println!();

    let start = Instant::now();
    let mut driver = ChambollePockDriver::new(params.clone()).unwrap_or_else(|e| {
        eprintln!("Error building driver ({}): {}", e.code(), e);
        std::process::exit(1);
    });
    log::info!("driver built in {:.2}s", start.elapsed().as_secs_f32());

    println!("Calibrating and running Chambolle-Pock...");
    let run_start = Instant::now();
    let result = driver.run(&noisy).unwrap_or_else(|e| {
        eprintln!("Error during denoising ({}): {}", e.code(), e);
        std::process::exit(1);
    });
    let elapsed = run_start.elapsed();

    println!();
    print_result_stats(&noisy, &result.x_hat, result.steps_taken);
    println!();
    println!(
        "Time: {:.2}s ({} steps, {:.1} steps/s)",
        elapsed.as_secs_f32(),
        result.steps_taken,
        result.steps_taken as f32 / elapsed.as_secs_f32()
    );

    if let Some(output_path) = output_path {
        write_image(&output_path, &result.x_hat);
        println!("Reconstruction written to {}", output_path.display());
    }
}

fn load_params(config_path: &PathBuf) -> Parameters {
    let config_str = fs::read_to_string(config_path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        std::process::exit(1);
    });
    let params: Parameters = serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        std::process::exit(1);
    });
    params.validate().unwrap_or_else(|e| {
        eprintln!("Invalid config: {}", e);
        std::process::exit(1);
    });
    params
}

fn load_image(path: &PathBuf, width: usize, height: usize) -> Array2 {
    let bytes = fs::read(path).unwrap_or_else(|e| {
        eprintln!("Error reading image file: {}", e);
        std::process::exit(1);
    });
    let expected = width * height * 4;
    if bytes.len() != expected {
        eprintln!(
            "Image file has {} bytes, expected {} ({}x{} f32 values)",
            bytes.len(),
            expected,
            width,
            height
        );
        std::process::exit(1);
    }
    let data: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    Array2::from_vec(height, width, data)
}

fn write_image(path: &PathBuf, image: &Array2) {
    let mut bytes = Vec::with_capacity(image.as_slice().len() * 4);
    for &v in image.as_slice() {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    fs::write(path, bytes).unwrap_or_else(|e| {
        eprintln!("Error writing output image: {}", e);
        std::process::exit(1);
    });
}

fn print_params_info(params: &Parameters) {
    println!("Grid: {}x{}", params.width, params.height);
    println!("Kernel sizes: {:?}", params.kernel_sizes);
    println!("Resolvent: {:?}", params.resolvent);
    println!(
        "tau: {}, sigma: {}, max_steps: {}, tolerance: {}",
        params.tau, params.sigma, params.max_steps, params.tolerance
    );
    println!(
        "Monte Carlo steps: {}, quantile: {}, penalized_scan: {}",
        params.monte_carlo_steps, params.quantile, params.penalized_scan
    );
}

fn print_result_stats(noisy: &Array2, x_hat: &Array2, steps_taken: usize) {
    let residual_l2 = {
        let mut acc = 0.0f64;
        for (&y, &x) in noisy.as_slice().iter().zip(x_hat.as_slice()) {
            let d = (y - x) as f64;
            acc += d * d;
        }
        acc.sqrt()
    };
    println!("Result:");
    println!("  Steps taken: {}", steps_taken);
    println!("  ||Y - X_hat||_2: {:.6}", residual_l2);
    println!("  ||X_hat||_1: {:.6}", x_hat.l1_norm());
}

fn print_example_config() {
    let params = Parameters::default();
    println!("Example configuration (config.json):");
    println!("{}", serde_json::to_string_pretty(&params).unwrap());
}
