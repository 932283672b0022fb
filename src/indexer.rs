//! Frame indexing
//!
//! Lists the extracted frames of one video in temporal order and applies the
//! frame stride. Order comes from the number embedded in each file name, not
//! from lexical order, so counters wider than the template's zero padding
//! still sort correctly.

use crate::error::{ClipPrepError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default file name template of extracted frames
pub const DEFAULT_FRAME_TEMPLATE: &str = "frame_%05d.png";

/// Parsed printf-style frame file name template such as `frame_%05d.png`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameTemplate {
    prefix: String,
    width: usize,
    suffix: String,
}

impl FrameTemplate {
    /// Parse a template containing exactly one `%d` / `%0Nd` placeholder
    pub fn parse(template: &str) -> Result<Self> {
        let start = template.find('%').ok_or_else(|| {
            ClipPrepError::invalid_config(format!(
                "Frame template '{}' has no %d placeholder",
                template
            ))
        })?;
        let rest = template.get(start + 1..).unwrap_or_default();
        let end = rest.find('d').ok_or_else(|| {
            ClipPrepError::invalid_config(format!(
                "Frame template '{}' has an unterminated placeholder",
                template
            ))
        })?;

        let width_spec = rest.get(..end).unwrap_or_default();
        let width = if width_spec.is_empty() {
            0
        } else if width_spec.chars().all(|c| c.is_ascii_digit()) {
            width_spec.trim_start_matches('0').parse().unwrap_or(0)
        } else {
            return Err(ClipPrepError::invalid_config(format!(
                "Frame template '{}' has an unsupported placeholder '%{}d'",
                template, width_spec
            )));
        };

        let prefix = template.get(..start).unwrap_or_default().to_string();
        let suffix = rest.get(end + 1..).unwrap_or_default().to_string();
        if suffix.contains('%') {
            return Err(ClipPrepError::invalid_config(format!(
                "Frame template '{}' has more than one placeholder",
                template
            )));
        }

        Ok(Self {
            prefix,
            width,
            suffix,
        })
    }

    /// Zero-padding width of the counter (0 when unpadded)
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Render the file name of frame `index`
    #[must_use]
    pub fn format(&self, index: u64) -> String {
        format!(
            "{}{:0width$}{}",
            self.prefix,
            index,
            self.suffix,
            width = self.width
        )
    }

    /// Frame number embedded in `file_name`, if it matches the template
    #[must_use]
    pub fn frame_number(&self, file_name: &str) -> Option<u64> {
        let digits = strip_suffix_ignore_case(file_name.strip_prefix(self.prefix.as_str())?, &self.suffix)?;
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    /// File extension of rendered names, without the dot
    #[must_use]
    pub fn extension(&self) -> &str {
        self.suffix
            .rsplit_once('.')
            .map_or("", |(_, extension)| extension)
    }
}

impl std::fmt::Display for FrameTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.width == 0 {
            write!(f, "{}%d{}", self.prefix, self.suffix)
        } else {
            write!(f, "{}%0{}d{}", self.prefix, self.width, self.suffix)
        }
    }
}

/// One channel of a dense optical-flow field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowChannel {
    Vx,
    Vy,
}

impl FlowChannel {
    pub const ALL: [FlowChannel; 2] = [FlowChannel::Vx, FlowChannel::Vy];

    /// Tag ending the file stem of this channel's frames
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::Vx => "vx",
            Self::Vy => "vy",
        }
    }
}

impl std::fmt::Display for FlowChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Rule deciding which files of a video directory are frames
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameMatcher {
    /// Image frames named after a template
    Template(FrameTemplate),
    /// Flow frames named `*vx.<ext>` / `*vy.<ext>`
    Flow {
        channel: FlowChannel,
        extension: String,
    },
}

impl FrameMatcher {
    /// Flow matcher sharing the extension of an image frame template
    #[must_use]
    pub fn flow(channel: FlowChannel, template: &FrameTemplate) -> Self {
        let extension = match template.extension() {
            "" => "png".to_string(),
            other => other.to_string(),
        };
        Self::Flow { channel, extension }
    }

    /// Frame number of `file_name`, or `None` when the file is not a frame
    #[must_use]
    pub fn frame_number(&self, file_name: &str) -> Option<u64> {
        match self {
            Self::Template(template) => template.frame_number(file_name),
            Self::Flow { channel, extension } => {
                let stem = strip_suffix_ignore_case(file_name, extension)?.strip_suffix('.')?;
                let body = stem.strip_suffix(channel.tag())?;
                last_digit_run(body)
            },
        }
    }
}

/// `text` without `suffix`, comparing ASCII letters case-insensitively (`.PNG` matches `.png`)
fn strip_suffix_ignore_case<'a>(text: &'a str, suffix: &str) -> Option<&'a str> {
    let split = text.len().checked_sub(suffix.len())?;
    let tail = text.get(split..)?;
    if tail.eq_ignore_ascii_case(suffix) {
        text.get(..split)
    } else {
        None
    }
}

fn last_digit_run(text: &str) -> Option<u64> {
    let end = text.rfind(|c: char| c.is_ascii_digit())? + 1;
    let head = text.get(..end)?;
    let start = head
        .rfind(|c: char| !c.is_ascii_digit())
        .map_or(0, |pos| pos + 1);
    head.get(start..)?.parse().ok()
}

/// Ordered, stride-decimated frame list of one video
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSequence {
    video_id: usize,
    frame_stride: usize,
    frames: Vec<PathBuf>,
}

impl FrameSequence {
    #[must_use]
    pub fn new(video_id: usize, frame_stride: usize, frames: Vec<PathBuf>) -> Self {
        Self {
            video_id,
            frame_stride,
            frames,
        }
    }

    /// Sequence with no frames, used for missing video directories
    #[must_use]
    pub fn empty(video_id: usize, frame_stride: usize) -> Self {
        Self::new(video_id, frame_stride, Vec::new())
    }

    #[must_use]
    pub fn video_id(&self) -> usize {
        self.video_id
    }

    #[must_use]
    pub fn frame_stride(&self) -> usize {
        self.frame_stride
    }

    #[must_use]
    pub fn frames(&self) -> &[PathBuf] {
        &self.frames
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[must_use]
    pub fn get(&self, position: usize) -> Option<&Path> {
        self.frames.get(position).map(PathBuf::as_path)
    }
}

/// Lists frame files of a video directory
#[derive(Debug, Clone)]
pub struct FrameIndexer {
    matcher: FrameMatcher,
}

impl FrameIndexer {
    #[must_use]
    pub fn new(matcher: FrameMatcher) -> Self {
        Self { matcher }
    }

    /// Indexer for image frames named after `template`
    #[must_use]
    pub fn for_template(template: FrameTemplate) -> Self {
        Self::new(FrameMatcher::Template(template))
    }

    #[must_use]
    pub fn matcher(&self) -> &FrameMatcher {
        &self.matcher
    }

    /// Every frame of `dir` in temporal order
    ///
    /// A missing directory yields an empty list; any other read error is
    /// returned.
    pub fn list_frames(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        if !dir.is_dir() {
            warn!(dir = %dir.display(), "Frame directory not found, treating as empty");
            return Ok(Vec::new());
        }

        let entries = std::fs::read_dir(dir)
            .map_err(|e| ClipPrepError::file_io_error("read frame directory", dir, &e))?;

        let mut numbered = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| ClipPrepError::file_io_error("read frame directory", dir, &e))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(number) = self.matcher.frame_number(name) {
                numbered.push((number, path));
            }
        }

        numbered.sort();
        debug!(dir = %dir.display(), frames = numbered.len(), "Indexed frame directory");

        Ok(numbered.into_iter().map(|(_, path)| path).collect())
    }

    /// Frames at positions 0, s, 2s, ... of `dir`
    pub fn index_video(&self, dir: &Path, video_id: usize, frame_stride: usize) -> Result<FrameSequence> {
        if frame_stride == 0 {
            return Err(ClipPrepError::config_value_error(
                "frame_stride",
                frame_stride,
                ">= 1",
                Some(1),
            ));
        }

        let frames = self
            .list_frames(dir)?
            .into_iter()
            .step_by(frame_stride)
            .collect();

        Ok(FrameSequence::new(video_id, frame_stride, frames))
    }
}
