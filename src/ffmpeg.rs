use crate::logw;
use anyhow::{Context, Result};
use std::path::Path;
use tokio::process::Command;

/// Voice cleanup applied to the concatenated dialogue track.
pub const VOICE_FILTER: &str = "highpass=f=60,lowpass=f=10500,\
equalizer=f=4000:width_type=h:width=150:g=3,\
equalizer=f=8000:width_type=h:width=300:g=-2,\
acompressor=threshold=-18dB:ratio=2:knee=2:attack=15:release=200,\
loudnorm=I=-16:TP=-1.5:LRA=11";

const ENHANCED_SAMPLE_RATE: &str = "48000";
const SOLID_BACKGROUND: &str = "0x0a0a0a";

async fn run_cmd(args: &[String]) -> Result<()> {
    if args.is_empty() {
        return Ok(());
    }

    let mut cmd = Command::new(&args[0]);
    if args.len() > 1 {
        cmd.args(&args[1..]);
    }

    let status = cmd.status().await.context("Command execution failed")?;
    if !status.success() {
        return Err(anyhow::anyhow!("Command failed: {:?}", args));
    }

    Ok(())
}

fn ffmpeg_args() -> Vec<String> {
    ["ffmpeg", "-y", "-hide_banner", "-loglevel", "error"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn push_all(args: &mut Vec<String>, items: &[&str]) {
    args.extend(items.iter().map(|s| s.to_string()));
}

pub async fn ffprobe_duration_seconds(path: &Path) -> Result<f64> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .await
        .context("ffprobe duration failed")?;

    if !output.status.success() {
        return Err(anyhow::anyhow!("ffprobe failed for {}", path.display()));
    }

    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let duration = text.parse::<f64>().unwrap_or(-1.0);
    if duration <= 0.0 {
        return Err(anyhow::anyhow!("Invalid duration for {}", path.display()));
    }
    Ok(duration)
}

/// One `file '...'` line for the concat demuxer.
pub fn concat_list_entry(path: &Path) -> String {
    let raw = path.display().to_string().replace('\\', "/");
    format!("file '{}'", raw.replace('\'', "'\\''"))
}

pub async fn write_concat_list(list_txt: &Path, items: &[impl AsRef<Path>]) -> Result<()> {
    let mut body = String::new();
    for item in items {
        let absolute = std::path::absolute(item.as_ref())
            .with_context(|| format!("Failed to resolve {}", item.as_ref().display()))?;
        body.push_str(&concat_list_entry(&absolute));
        body.push('\n');
    }
    tokio::fs::write(list_txt, body)
        .await
        .with_context(|| format!("Failed to write concat list {}", list_txt.display()))
}

pub async fn ffmpeg_trim_audio(
    in_audio: &Path,
    start_s: f64,
    dur_s: f64,
    out_m4a: &Path,
) -> Result<bool> {
    let mut args = ffmpeg_args();
    args.extend([
        "-ss".to_string(),
        format!("{:.3}", start_s),
        "-i".to_string(),
        in_audio.display().to_string(),
        "-t".to_string(),
        format!("{:.3}", dur_s),
    ]);
    push_all(&mut args, &["-c:a", "aac", "-b:a", "192k"]);
    args.push(out_m4a.display().to_string());
    run_cmd(&args).await?;
    Ok(out_m4a.exists())
}

pub async fn ffmpeg_concat_audio(list_txt: &Path, out_audio: &Path) -> Result<bool> {
    let mut args = ffmpeg_args();
    push_all(&mut args, &["-f", "concat", "-safe", "0", "-i"]);
    args.push(list_txt.display().to_string());
    push_all(&mut args, &["-c", "copy"]);
    args.push(out_audio.display().to_string());
    run_cmd(&args).await?;
    Ok(out_audio.exists())
}

/// Concatenates rendered parts that share codec parameters, without re-encoding.
pub async fn ffmpeg_concat_videos(list_txt: &Path, out_mp4: &Path) -> Result<bool> {
    let mut args = ffmpeg_args();
    push_all(&mut args, &["-f", "concat", "-safe", "0", "-i"]);
    args.push(list_txt.display().to_string());
    push_all(&mut args, &["-c", "copy", "-movflags", "+faststart"]);
    args.push(out_mp4.display().to_string());
    run_cmd(&args).await?;
    Ok(out_mp4.exists())
}

pub async fn ffmpeg_enhance_voice(in_audio: &Path, out_audio: &Path) -> Result<bool> {
    let mut args = ffmpeg_args();
    args.extend([
        "-i".to_string(),
        in_audio.display().to_string(),
        "-af".to_string(),
        VOICE_FILTER.to_string(),
        "-ar".to_string(),
        ENHANCED_SAMPLE_RATE.to_string(),
    ]);
    args.push(out_audio.display().to_string());
    run_cmd(&args).await?;
    Ok(out_audio.exists())
}

/// Scales and center-crops an image so it covers the whole frame.
pub async fn ffmpeg_fit_background(
    in_image: &Path,
    width: u32,
    height: u32,
    out_image: &Path,
) -> Result<bool> {
    let mut args = ffmpeg_args();
    args.extend([
        "-i".to_string(),
        in_image.display().to_string(),
        "-vf".to_string(),
        format!(
            "scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h}",
            w = width,
            h = height
        ),
        "-frames:v".to_string(),
        "1".to_string(),
    ]);
    args.push(out_image.display().to_string());
    run_cmd(&args).await?;
    Ok(out_image.exists())
}

pub async fn ffmpeg_solid_background(width: u32, height: u32, out_image: &Path) -> Result<bool> {
    let mut args = ffmpeg_args();
    args.extend([
        "-f".to_string(),
        "lavfi".to_string(),
        "-i".to_string(),
        format!("color=c={}:s={}x{}", SOLID_BACKGROUND, width, height),
        "-frames:v".to_string(),
        "1".to_string(),
    ]);
    args.push(out_image.display().to_string());
    run_cmd(&args).await?;
    Ok(out_image.exists())
}

/// Renders one still background with its audio slice through a filter script.
pub async fn ffmpeg_render_captioned(
    background: &Path,
    audio: &Path,
    filter_script: &Path,
    fps: u32,
    duration_s: f64,
    out_mp4: &Path,
) -> Result<bool> {
    let mut args = ffmpeg_args();
    args.extend([
        "-loop".to_string(),
        "1".to_string(),
        "-framerate".to_string(),
        fps.to_string(),
        "-i".to_string(),
        background.display().to_string(),
        "-i".to_string(),
        audio.display().to_string(),
        "-filter_complex_script".to_string(),
        filter_script.display().to_string(),
    ]);
    push_all(&mut args, &["-map", "[v]", "-map", "1:a", "-t"]);
    args.push(format!("{:.3}", duration_s));
    push_all(
        &mut args,
        &[
            "-c:v", "libx264", "-pix_fmt", "yuv420p", "-preset", "veryfast", "-crf", "22", "-c:a",
            "aac", "-b:a", "192k", "-ar", ENHANCED_SAMPLE_RATE, "-shortest", "-movflags",
            "+faststart",
        ],
    );
    args.push(out_mp4.display().to_string());

    if let Err(err) = run_cmd(&args).await {
        logw(format!("Chunk render failed ({}): {}", out_mp4.display(), err));
        return Ok(false);
    }
    Ok(out_mp4.exists())
}

/// Renders a single frame from `background` through a filter script.
pub async fn ffmpeg_render_still(background: &Path, filter_script: &Path, out_image: &Path) -> Result<bool> {
    let mut args = ffmpeg_args();
    args.extend([
        "-i".to_string(),
        background.display().to_string(),
        "-filter_complex_script".to_string(),
        filter_script.display().to_string(),
    ]);
    push_all(&mut args, &["-map", "[v]", "-frames:v", "1", "-q:v", "2"]);
    args.push(out_image.display().to_string());

    if let Err(err) = run_cmd(&args).await {
        logw(format!("Still render failed ({}): {}", out_image.display(), err));
        return Ok(false);
    }
    Ok(out_image.exists())
}
