use argh::FromArgs;
use serde::Deserialize;
use std::path::PathBuf;

use radar_fusion::{
    f3d::{
        camera::CameraView, catalog::Catalog, config::FusionConfig, fusion::fuse_sample,
        projection::project_all,
    },
    io::{catalog::NuScenesCatalog, pcd::RadarPcdOptions},
};

/// Fuse the radars of one sample and project them onto the cameras
#[derive(FromArgs)]
struct Args {
    /// path to the dataset root
    #[argh(option, short = 'd')]
    dataroot: PathBuf,

    /// dataset version holding the tables
    #[argh(option, short = 'v', default = "String::from(\"v1.0-mini\")")]
    version: String,

    /// index of the sample in table order
    #[argh(option, short = 's', default = "0")]
    sample_index: usize,

    /// optional JSON file overriding the rig and the radar filter
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct DemoConfig {
    #[serde(flatten)]
    fusion: FusionConfig,
    #[serde(default)]
    pcd: RadarPcdOptions,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let config: DemoConfig = match &args.config {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => DemoConfig::default(),
    };

    let catalog =
        NuScenesCatalog::load(&args.dataroot, &args.version)?.with_pcd_options(config.pcd);
    let sample = catalog.sample(args.sample_index)?;
    log::info!("sample {} of {}: {}", args.sample_index, catalog.num_samples(), sample);

    let sweep = fuse_sample(
        &catalog,
        sample,
        &config.fusion.radars,
        &config.fusion.reference_channel,
    )?;

    println!("fused sweep of sample {sample}");
    for (sensor, count) in sweep.points_per_sensor() {
        println!("  {sensor:<18} {count:>5} points");
    }
    println!("  {:<18} {:>5} points", "total", sweep.total_points());

    let views = config
        .fusion
        .cameras
        .iter()
        .map(|camera| catalog.camera_view(sample, camera))
        .collect::<Result<Vec<CameraView>, _>>()?;

    for projection in project_all(&views, &sweep) {
        println!(
            "{:<16} {:>5} in front, {:>5} inside {}x{}",
            projection.camera,
            projection.visible_count(),
            projection.in_image_count(),
            projection.image_size.width,
            projection.image_size.height
        );
        for group in projection.sensors.iter().filter(|g| !g.points.is_empty()) {
            let [r, g, b] = group.color.to_array();
            println!(
                "    {:<18} {:>5} points  rgb({r}, {g}, {b})",
                group.sensor,
                group.points.len()
            );
        }
    }

    Ok(())
}
