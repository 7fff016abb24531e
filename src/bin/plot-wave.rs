use plotters::prelude::*;
use trackmaker::wav::Wav;

/// Columns in the chart; each one shows the min/max of a slice of frames
const COLUMNS: usize = 2000;

struct Args {
    input_path: String,
    output_path: String,
}

fn print_usage() {
    eprintln!("Usage: plot-wave <input.wav> <output.svg>");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  plot-wave song/trackmaker_output.wav song.svg");
}

fn parse_args() -> Result<Args, Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() != 3 {
        print_usage();
        return Err("Invalid number of arguments".into());
    }

    Ok(Args {
        input_path: args[1].clone(),
        output_path: args[2].clone(),
    })
}

/// Reduce a channel to (time, min, max) per column
fn envelope(wav: &Wav, channel: usize) -> Vec<(f32, f32, f32)> {
    let frames = wav.frames();
    let chunk = frames.len().div_ceil(COLUMNS).max(1);
    let rate = wav.sample_rate().max(1) as f32;

    frames
        .chunks(chunk)
        .enumerate()
        .map(|(i, slice)| {
            let (lo, hi) = slice
                .iter()
                .map(|f| f[channel])
                .fold((f32::MAX, f32::MIN), |(lo, hi), s| (lo.min(s), hi.max(s)));
            ((i * chunk) as f32 / rate, lo, hi)
        })
        .collect()
}

fn create_plot(args: &Args, wav: &Wav) -> Result<(), Box<dyn std::error::Error>> {
    let root = SVGBackend::new(&args.output_path, (1200, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    let seconds = wav.frame_count() as f32 / wav.sample_rate().max(1) as f32;
    let limit = wav.peak().max(1.0) * 1.05;
    let title = format!("{} ({:.2}s)", args.input_path, seconds);

    let halves = root.split_evenly((2, 1));
    for (channel, (area, label)) in halves.iter().zip(["Left", "Right"]).enumerate() {
        let mut chart = ChartBuilder::on(area)
            .caption(format!("{title} - {label}"), ("sans-serif", 18))
            .margin(10)
            .x_label_area_size(30)
            .y_label_area_size(50)
            .build_cartesian_2d(0f32..seconds.max(f32::EPSILON), -limit..limit)?;

        chart
            .configure_mesh()
            .x_desc("Time (s)")
            .y_desc("Amplitude")
            .x_labels(10)
            .y_labels(5)
            .draw()?;

        let columns = envelope(wav, channel);
        chart.draw_series(LineSeries::new(
            columns.iter().map(|&(t, _, hi)| (t, hi)),
            BLUE.stroke_width(1),
        ))?;
        chart.draw_series(LineSeries::new(
            columns.iter().map(|&(t, lo, _)| (t, lo)),
            BLUE.stroke_width(1),
        ))?;

        // Anything past full scale clips when saved as 16-bit
        if wav.peak() > 1.0 {
            for level in [1.0f32, -1.0] {
                chart.draw_series(LineSeries::new(
                    [(0.0, level), (seconds, level)],
                    RED.stroke_width(1),
                ))?;
            }
        }
    }

    root.present()?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = parse_args()?;

    println!("Waveform Plot Generator");
    println!("=======================");

    let wav = Wav::load(&args.input_path)?;
    println!("  Input: {}", args.input_path);
    println!("  Frames: {}", wav.frame_count());
    println!("  Sample rate: {} Hz", wav.sample_rate());
    println!("  Peak: {:.3}", wav.peak());

    print!("  Creating plot... ");
    create_plot(&args, &wav)?;
    println!("done");

    println!();
    println!("Output: {}", args.output_path);

    Ok(())
}
