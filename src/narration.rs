use anyhow::{Context, Result};
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Narration text for one zone of one room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneContent {
    pub narration: String,
}

/// Content file shape: room id -> zone key ("Z1".."Z3") -> content.
pub type ContentMap = HashMap<String, HashMap<String, ZoneContent>>;

/// Built-in fallback content so the guide still says something when no
/// content file is deployed.
static BUILTIN_CONTENT: Lazy<ContentMap> = Lazy::new(|| {
    let mut rooms = ContentMap::new();
    let mut zones = HashMap::new();
    zones.insert(
        "Z1".to_string(),
        ZoneContent {
            narration: "You are entering the exhibit area.".to_string(),
        },
    );
    zones.insert(
        "Z2".to_string(),
        ZoneContent {
            narration: "You are close to the exhibit.".to_string(),
        },
    );
    zones.insert(
        "Z3".to_string(),
        ZoneContent {
            narration: "You are right in front of the exhibit.".to_string(),
        },
    );
    rooms.insert("SALA_2".to_string(), zones);
    rooms
});

/// Selects the narration line for a room/zone pair and suppresses
/// re-announcements of the line the visitor just heard. Text only; audio
/// playback is the presentation layer's concern.
#[derive(Debug)]
pub struct GuideNarrator {
    content: ContentMap,
    last_spoken_key: Option<String>,
}

impl GuideNarrator {
    pub fn new(content: ContentMap) -> Self {
        GuideNarrator {
            content,
            last_spoken_key: None,
        }
    }

    /// Load content from a JSON file, falling back to the built-in set
    /// when the file is missing.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!("Narration content not found at {:?}, using built-in set", path);
            return Ok(GuideNarrator::new(BUILTIN_CONTENT.clone()));
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read narration content: {:?}", path))?;
        let content: ContentMap = serde_json::from_str(&content)
            .with_context(|| "Failed to parse narration content")?;

        info!("Loaded narration content for {} rooms", content.len());
        Ok(GuideNarrator::new(content))
    }

    /// Look up the narration for a zone without touching announce state.
    pub fn narration_for(&self, room_id: &str, zone: u8) -> Option<&str> {
        if !(1..=3).contains(&zone) {
            return None;
        }
        let zone_key = format!("Z{}", zone);
        self.content
            .get(room_id)?
            .get(&zone_key)
            .map(|c| c.narration.as_str())
    }

    /// Narration to speak on entering `zone` of `room_id`, or None when the
    /// zone has no content or was already announced.
    pub fn announce(&mut self, room_id: &str, zone: u8) -> Option<&str> {
        let key = format!("{}:Z{}", room_id, zone);
        if self.last_spoken_key.as_deref() == Some(key.as_str()) {
            return None;
        }

        // Only remember keys that actually produced a line, so entering a
        // content-less zone does not eat the next announcement
        if self.narration_for(room_id, zone).is_some() {
            debug!("Announcing {}", key);
            self.last_spoken_key = Some(key);
            self.narration_for(room_id, zone)
        } else {
            None
        }
    }

    /// Forget the last announcement, so it can be repeated on request.
    pub fn reset(&mut self) {
        self.last_spoken_key = None;
    }

    pub fn room_count(&self) -> usize {
        self.content.len()
    }
}

/// Write the built-in content as a starter file users can edit.
pub fn write_default_content<P: AsRef<Path>>(path: P) -> Result<()> {
    let content = serde_json::to_string_pretty(&*BUILTIN_CONTENT)?;
    fs::write(path.as_ref(), content)?;
    info!("Created narration content: {:?}", path.as_ref());
    Ok(())
}
