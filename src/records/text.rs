//! Text resources: page texts, NPC texts, broadcast texts.

use serde::Serialize;

use crate::error::Result;
use crate::schema::FieldRecord;

/// Number of options in an NPC text.
pub const NPC_TEXT_OPTIONS: usize = 8;

/// One page of a readable item or object.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PageTextPage {
    /// Page body.
    pub text: String,
    /// Next page entry, 0 for the last page.
    pub next_page: u32,
}

impl PageTextPage {
    /// Build from a replayed page text response.
    pub fn from_fields(fields: &FieldRecord) -> Result<Self> {
        Ok(Self {
            text: fields.text("text")?.to_string(),
            next_page: fields.u32("next_page")?,
        })
    }
}

/// Weighted broadcast text options of an NPC text.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NpcTextOptions {
    /// Option probabilities.
    pub probabilities: Vec<f32>,
    /// Broadcast text of each option.
    pub broadcast_text_ids: Vec<u32>,
}

impl NpcTextOptions {
    /// Build from the decoded text blob.
    pub fn from_fields(fields: &FieldRecord) -> Result<Self> {
        let probabilities = fields
            .list("probabilities")?
            .iter()
            .map(|p| p.f32("probability"))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            probabilities,
            broadcast_text_ids: fields.list_u32("broadcast_texts", "broadcast_text")?,
        })
    }
}

/// BroadcastText DB2 row.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BroadcastText {
    /// Row id.
    pub id: u32,
    /// Language id.
    pub language: u32,
    /// Text spoken by male speakers.
    pub male_text: String,
    /// Text spoken by female speakers.
    pub female_text: String,
    /// Emotes played with the text.
    pub emote_ids: Vec<u32>,
    /// Delay before each emote.
    pub emote_delays: Vec<u32>,
    /// Sound id.
    pub sound_id: u32,
    /// Unknown, emote related.
    pub unk_1: u32,
    /// Unknown.
    pub unk_2: u32,
}

impl BroadcastText {
    /// Build from a replayed BroadcastText row.
    pub fn from_fields(fields: &FieldRecord) -> Result<Self> {
        Ok(Self {
            id: fields.u32("id")?,
            language: fields.u32("language")?,
            male_text: fields.text("male_text")?.to_string(),
            female_text: fields.text("female_text")?.to_string(),
            emote_ids: fields.list_u32("emotes", "emote_id")?,
            emote_delays: fields.list_u32("emote_delays", "delay")?,
            sound_id: fields.u32("sound_id")?,
            unk_1: fields.u32("unk_1")?,
            unk_2: fields.u32("unk_2")?,
        })
    }
}
