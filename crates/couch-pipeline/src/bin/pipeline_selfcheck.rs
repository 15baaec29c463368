use std::path::Path;
use std::process::Command;

use couch_pipeline::PipelineConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = PipelineConfig::from_env();

    println!(
        "pipeline-selfcheck: starting with data_dir={}",
        config.paths.data_dir.display()
    );
    ensure_dir(&config.paths.data_dir).await?;
    ensure_dir(&config.paths.assets_dir).await?;
    ensure_tool("yt-dlp", "--version")?;
    ensure_tool("ffmpeg", "-version")?;
    ensure_tool("ffprobe", "-version")?;
    ensure_file(&config.detection.model_path)?;
    ensure_file(&config.segmentation.model_path)?;
    ensure_env_present(&["OPENAI_API_KEY"])?;

    println!("pipeline-selfcheck: ok");
    Ok(())
}

async fn ensure_dir<P: AsRef<Path>>(path: P) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(path.as_ref()).await?;
    Ok(())
}

fn ensure_tool(name: &str, version_flag: &str) -> anyhow::Result<()> {
    let path = which::which(name).map_err(|e| anyhow::anyhow!("{} not available: {}", name, e))?;

    let output = Command::new(&path)
        .arg(version_flag)
        .output()
        .map_err(|e| anyhow::anyhow!("{} not runnable: {}", name, e))?;

    if !output.status.success() {
        return Err(anyhow::anyhow!(
            "{} {} failed: {:?}",
            name,
            version_flag,
            output.status
        ));
    }
    Ok(())
}

fn ensure_file(path: &str) -> anyhow::Result<()> {
    if !Path::new(path).is_file() {
        return Err(anyhow::anyhow!("model file missing: {}", path));
    }
    Ok(())
}

fn ensure_env_present(vars: &[&str]) -> anyhow::Result<()> {
    for var in vars {
        if std::env::var(var).is_err() {
            return Err(anyhow::anyhow!("missing required env var {}", var));
        }
    }
    Ok(())
}
