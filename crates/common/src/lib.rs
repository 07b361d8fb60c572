use serde::Serialize;

pub const AUDIO_EXTENSIONS: [&str; 4] = ["mp3", "flac", "ogg", "wav"];

/// One audio file inside the catalog, addressed by its year and season folders.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackRef {
    pub year: String,
    pub season: String,
    pub file_name: String,
    pub extension: String,
}

impl TrackRef {
    pub fn new(year: &str, season: &str, file_name: &str) -> Self {
        Self {
            year: year.to_string(),
            season: season.to_string(),
            file_name: file_name.to_string(),
            extension: extension_of(file_name).unwrap_or("").to_string(),
        }
    }

    pub fn stream_url(&self) -> String {
        format!(
            "/stream/{}/{}/{}",
            url_escape(&self.year),
            url_escape(&self.season),
            url_escape(&self.file_name)
        )
    }

    pub fn cache_key(&self) -> String {
        cover_cache_key(&self.file_name)
    }
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct TrackDescriptor {
    pub artist: String,
    pub title: String,
    #[serde(rename = "ext")]
    pub extension: String,
    #[serde(rename = "cover")]
    pub cover_url: String,
    #[serde(rename = "url")]
    pub stream_url: String,
}

/// Extension after the last dot, without the dot. `None` when there is no dot
/// or nothing follows it.
pub fn extension_of(file_name: &str) -> Option<&str> {
    match file_name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => Some(ext),
        _ => None,
    }
}

pub fn strip_extension(file_name: &str) -> &str {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !ext.is_empty() => stem,
        _ => file_name,
    }
}

pub fn is_audio_file_name(file_name: &str) -> bool {
    match extension_of(file_name) {
        Some(ext) => AUDIO_EXTENSIONS
            .iter()
            .any(|known| ext.eq_ignore_ascii_case(known)),
        None => false,
    }
}

pub fn content_type_for(file_name: &str) -> String {
    let ext = extension_of(file_name)
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mp3" => "audio/mpeg".to_string(),
        "flac" => "audio/flac".to_string(),
        "ogg" => "audio/ogg".to_string(),
        "wav" => "audio/wav".to_string(),
        _ => mime_guess::from_path(file_name)
            .first_or_octet_stream()
            .to_string(),
    }
}

/// Stem of the file name with every whitespace run collapsed into `_`.
pub fn cover_cache_key(file_name: &str) -> String {
    let stem = strip_extension(file_name);
    let mut out = String::with_capacity(stem.len());
    let mut in_space = false;
    for ch in stem.chars() {
        if ch.is_whitespace() {
            if !in_space {
                out.push('_');
            }
            in_space = true;
        } else {
            out.push(ch);
            in_space = false;
        }
    }
    out
}

/// True when `value` names exactly one entry inside a directory.
pub fn is_safe_component(value: &str) -> bool {
    !value.is_empty()
        && value != "."
        && value != ".."
        && !value.contains(['/', '\\', '\0'])
}

pub fn url_escape(input: &str) -> String {
    let mut out = String::new();
    for byte in input.as_bytes() {
        match byte {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'_'
            | b'.'
            | b'~' => out.push(*byte as char),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

/// Case-insensitive ordering used for every listing, ties broken by the raw name.
pub fn sort_names(names: &mut [String]) {
    names.sort_by(|a, b| {
        a.to_lowercase()
            .cmp(&b.to_lowercase())
            .then_with(|| a.cmp(b))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_strips_extension_and_whitespace() {
        assert_eq!(cover_cache_key("Artist Name - Song.mp3"), "Artist_Name_-_Song");
        assert_eq!(cover_cache_key("a \t b.flac"), "a_b");
        assert_eq!(cover_cache_key("noext"), "noext");
    }

    #[test]
    fn audio_extension_match_is_case_insensitive() {
        assert!(is_audio_file_name("song.MP3"));
        assert!(is_audio_file_name("song.Flac"));
        assert!(!is_audio_file_name("cover.jpg"));
        assert!(!is_audio_file_name("mp3"));
        assert!(!is_audio_file_name("trailing."));
    }

    #[test]
    fn content_type_follows_extension() {
        assert_eq!(content_type_for("a.mp3"), "audio/mpeg");
        assert_eq!(content_type_for("a.FLAC"), "audio/flac");
        assert_eq!(content_type_for("a.ogg"), "audio/ogg");
        assert_eq!(content_type_for("a.wav"), "audio/wav");
    }

    #[test]
    fn rejects_traversal_components() {
        assert!(is_safe_component("2023"));
        assert!(is_safe_component("my song.mp3"));
        assert!(!is_safe_component(".."));
        assert!(!is_safe_component("."));
        assert!(!is_safe_component(""));
        assert!(!is_safe_component("a/b"));
        assert!(!is_safe_component("a\\b"));
    }

    #[test]
    fn stream_url_escapes_every_segment() {
        let track = TrackRef::new("2023", "early spring", "A & B.mp3");
        assert_eq!(track.extension, "mp3");
        assert_eq!(track.stream_url(), "/stream/2023/early%20spring/A%20%26%20B.mp3");
    }

    #[test]
    fn sorts_case_insensitively() {
        let mut names = vec!["Banana.mp3".to_string(), "apple.flac".to_string()];
        sort_names(&mut names);
        assert_eq!(names, vec!["apple.flac", "Banana.mp3"]);
    }

    #[test]
    fn descriptor_uses_wire_field_names() {
        let descriptor = TrackDescriptor {
            artist: "A".to_string(),
            title: "T".to_string(),
            extension: "mp3".to_string(),
            cover_url: "/covers/x.jpg".to_string(),
            stream_url: "/stream/y/s/x.mp3".to_string(),
        };
        let value = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(value["ext"], "mp3");
        assert_eq!(value["cover"], "/covers/x.jpg");
        assert_eq!(value["url"], "/stream/y/s/x.mp3");
    }
}
