// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Bytewords, minimal form
//!
//! Each byte maps to a four letter word, the minimal form keeps the first and
//! last letter. Encoded strings carry a big-endian CRC-32 of the data.

use crc::{Crc, CRC_32_ISO_HDLC};

use crate::Error;

pub(crate) const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

const CRC_LEN: usize = 4;

#[rustfmt::skip]
pub const WORDS: [&str; 256] = [
    "able", "acid", "also", "apex", "aqua", "arch", "atom", "aunt", "away", "axis", "back", "bald", "barn", "belt", "beta", "bias",
    "blue", "body", "brag", "brew", "bulb", "buzz", "calm", "cash", "cats", "chef", "city", "claw", "code", "cola", "cook", "cost",
    "crux", "curl", "cusp", "cyan", "dark", "data", "days", "deli", "dice", "diet", "door", "down", "draw", "drop", "drum", "dull",
    "duty", "each", "easy", "echo", "edge", "epic", "even", "exam", "exit", "eyes", "fact", "fair", "fern", "figs", "film", "fish",
    "fizz", "flap", "flew", "flux", "foxy", "free", "frog", "fuel", "fund", "gala", "game", "gear", "gems", "gift", "girl", "glow",
    "good", "gray", "grim", "guru", "gush", "gyro", "half", "hang", "hard", "hawk", "heat", "help", "high", "hill", "holy", "hope",
    "horn", "huts", "iced", "idea", "idle", "inch", "inky", "into", "iris", "iron", "item", "jade", "jazz", "join", "jolt", "jowl",
    "judo", "jugs", "jump", "junk", "jury", "keep", "keno", "kept", "keys", "kick", "kiln", "king", "kite", "kiwi", "knob", "lamb",
    "lava", "lazy", "leaf", "legs", "liar", "limp", "lion", "list", "logo", "loud", "love", "luau", "luck", "lung", "main", "many",
    "math", "maze", "memo", "menu", "meow", "mild", "mint", "miss", "monk", "nail", "navy", "need", "news", "next", "noon", "note",
    "numb", "obey", "oboe", "omit", "onyx", "open", "oval", "owls", "paid", "part", "peck", "play", "plus", "poem", "pool", "pose",
    "puff", "puma", "purr", "quad", "quiz", "race", "ramp", "real", "redo", "rich", "road", "rock", "roof", "ruby", "ruin", "runs",
    "rust", "safe", "saga", "scar", "sets", "silk", "skew", "slot", "soap", "solo", "song", "stub", "surf", "swan", "taco", "task",
    "taxi", "tent", "tied", "time", "tiny", "toil", "tomb", "toys", "trip", "tuna", "twin", "ugly", "undo", "unit", "urge", "user",
    "vast", "very", "veto", "vial", "vibe", "view", "visa", "void", "vows", "wall", "wand", "warm", "wasp", "wave", "waxy", "webs",
    "what", "when", "whiz", "wolf", "work", "yank", "yawn", "yell", "yoga", "yurt", "zaps", "zero", "zest", "zinc", "zone", "zoom",
];

fn minimal(b: u8) -> [u8; 2] {
    let w = WORDS[b as usize].as_bytes();
    [w[0], w[3]]
}

/// Encode `data` with trailing checksum
pub fn encode_minimal(data: &[u8]) -> String {
    let crc = CRC32.checksum(data).to_be_bytes();

    data.iter()
        .chain(crc.iter())
        .flat_map(|b| minimal(*b))
        .map(char::from)
        .collect()
}

/// Decode a minimal bytewords string, checking the trailing checksum
pub fn decode_minimal(s: &str) -> Result<Vec<u8>, Error> {
    let s = s.as_bytes();
    if s.len() % 2 != 0 || s.len() < 2 * CRC_LEN {
        return Err(Error::InvalidPart("invalid bytewords length".into()));
    }

    let mut out = Vec::with_capacity(s.len() / 2);
    for p in s.chunks_exact(2) {
        let p = [p[0].to_ascii_lowercase(), p[1].to_ascii_lowercase()];

        let b = (0..=255u8)
            .find(|b| minimal(*b) == p)
            .ok_or_else(|| Error::InvalidPart("invalid byteword".into()))?;
        out.push(b);
    }

    let crc = out.split_off(out.len() - CRC_LEN);
    if CRC32.checksum(&out).to_be_bytes()[..] != crc[..] {
        return Err(Error::InvalidPart("bytewords checksum mismatch".into()));
    }

    Ok(out)
}
