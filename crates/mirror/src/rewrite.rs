// Playlist rewriter: maps every resource referenced by a media playlist to a
// generated local filename and produces the download task list.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::{debug, trace};
use url::Url;

use crate::config::MirrorConfig;
use crate::error::MirrorError;
use crate::resolver::resolve_url;

/// Required first line of every playlist.
pub const HEADER_TAG: &str = "#EXTM3U";

const BOM: char = '\u{feff}';

static QUOTED_URI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"URI="([^"]+)""#).expect("static URI pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// Referenced from a tag attribute (`#EXT-X-KEY`, `#EXT-X-MAP`, ...)
    Key,
    /// A plain URI line
    Segment,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Key => f.write_str("key"),
            ResourceKind::Segment => f.write_str("segment"),
        }
    }
}

/// One resource referenced by the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLink {
    /// Reference exactly as written in the manifest
    pub original_reference: String,
    /// Resolved fetch target
    pub absolute_url: Url,
    /// Generated filename, relative to the output directory
    pub local_path: String,
    pub kind: ResourceKind,
}

/// Hands out strictly increasing sequence numbers for local filenames.
#[derive(Debug)]
pub struct SequenceCounter {
    last: u64,
}

impl SequenceCounter {
    /// The first value returned by [`SequenceCounter::next_value`] is `offset + 1`.
    pub fn new(offset: u64) -> Self {
        Self { last: offset }
    }

    pub fn next_value(&mut self) -> u64 {
        self.last += 1;
        self.last
    }

    /// `prefix` followed by the next sequence value zero-padded to `width`.
    pub fn next_name(&mut self, prefix: &str, width: usize) -> String {
        let value = self.next_value();
        format!("{prefix}{value:0width$}.ts")
    }
}

/// Naming and scanning parameters of a rewrite pass.
#[derive(Debug, Clone)]
pub struct RewriteOptions {
    pub name_prefix: String,
    pub sequence_offset: u64,
    pub sequence_width: usize,
    pub key_scan_lines: usize,
}

impl Default for RewriteOptions {
    fn default() -> Self {
        Self::from(&MirrorConfig::default())
    }
}

impl From<&MirrorConfig> for RewriteOptions {
    fn from(config: &MirrorConfig) -> Self {
        Self {
            name_prefix: config.name_prefix.clone(),
            sequence_offset: config.sequence_offset,
            sequence_width: config.sequence_width,
            key_scan_lines: config.key_scan_lines,
        }
    }
}

/// Output of [`rewrite`].
#[derive(Debug, Clone)]
pub struct RewrittenPlaylist {
    /// Manifest text with every handled reference replaced by its local name
    pub text: String,
    /// Download tasks in manifest order
    pub links: Vec<ResourceLink>,
}

/// Fails with [`MirrorError::Format`] unless the first non-blank line is the
/// `#EXTM3U` header. A leading byte order mark is ignored.
pub fn check_header(manifest: &str) -> Result<(), MirrorError> {
    let first = manifest
        .trim_start_matches(BOM)
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default();

    if first == HEADER_TAG {
        Ok(())
    } else {
        Err(MirrorError::format(first))
    }
}

struct LinkTable<'a> {
    base: &'a Url,
    options: &'a RewriteOptions,
    counter: SequenceCounter,
    assigned: HashMap<String, String>,
    links: Vec<ResourceLink>,
}

impl<'a> LinkTable<'a> {
    fn new(base: &'a Url, options: &'a RewriteOptions) -> Self {
        Self {
            base,
            options,
            counter: SequenceCounter::new(options.sequence_offset),
            assigned: HashMap::new(),
            links: Vec::new(),
        }
    }

    /// Returns the local name for `reference`, allocating one on first sight.
    fn register(&mut self, reference: &str, kind: ResourceKind) -> Result<String, MirrorError> {
        if let Some(local) = self.assigned.get(reference) {
            trace!(reference, local = %local, "Reference already mapped");
            return Ok(local.clone());
        }

        let absolute_url = resolve_url(self.base, reference)?;
        let local_path = self
            .counter
            .next_name(&self.options.name_prefix, self.options.sequence_width);

        debug!(%kind, reference, url = %absolute_url, local = %local_path, "Mapped resource");
        self.assigned.insert(reference.to_owned(), local_path.clone());
        self.links.push(ResourceLink {
            original_reference: reference.to_owned(),
            absolute_url,
            local_path: local_path.clone(),
            kind,
        });
        Ok(local_path)
    }
}

/// Replaces the trimmed content of `raw` with `replacement`, keeping the
/// surrounding whitespace (including a trailing `\r`).
fn replace_line_content(raw: &str, replacement: &str) -> String {
    let content = raw.trim();
    let leading = raw.len() - raw.trim_start().len();
    let trailing = &raw[leading + content.len()..];
    format!("{}{}{}", &raw[..leading], replacement, trailing)
}

/// Rewrites `manifest`, fetched from `base`, so that it references local files.
///
/// Plain URI lines are replaced as a whole. Within comment lines whose index
/// is at most `key_scan_lines`, every `URI="..."` attribute value is mapped
/// as well, and that quoted value is then substituted in every comment line
/// of the document. A reference that appears more than once keeps the name
/// it got first and yields a single link.
pub fn rewrite(
    base: &Url,
    manifest: &str,
    options: &RewriteOptions,
) -> Result<RewrittenPlaylist, MirrorError> {
    check_header(manifest)?;

    let mut table = LinkTable::new(base, options);
    let mut key_names: HashMap<String, String> = HashMap::new();
    let mut lines: Vec<String> = Vec::new();
    let mut comment_lines: Vec<usize> = Vec::new();

    for (index, raw) in manifest.split('\n').enumerate() {
        let content = raw.trim().trim_start_matches(BOM);

        if content.is_empty() {
            lines.push(raw.to_owned());
            continue;
        }

        if content.starts_with('#') {
            if index <= options.key_scan_lines {
                for caps in QUOTED_URI.captures_iter(content) {
                    let reference = &caps[1];
                    let local = table.register(reference, ResourceKind::Key)?;
                    key_names.insert(reference.to_owned(), local);
                }
            }
            comment_lines.push(lines.len());
            lines.push(raw.to_owned());
            continue;
        }

        let local = table.register(content, ResourceKind::Segment)?;
        lines.push(replace_line_content(raw, &local));
    }

    if !key_names.is_empty() {
        for index in comment_lines {
            let line = &lines[index];
            if !QUOTED_URI.is_match(line) {
                continue;
            }
            let replaced = QUOTED_URI
                .replace_all(line, |caps: &Captures| match key_names.get(&caps[1]) {
                    Some(local) => format!("URI=\"{local}\""),
                    None => caps[0].to_owned(),
                })
                .into_owned();
            lines[index] = replaced;
        }
    }

    debug!(links = table.links.len(), "Playlist rewritten");
    Ok(RewrittenPlaylist {
        text: lines.join("\n"),
        links: table.links,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn base() -> Url {
        Url::parse("https://example.com/a/index.m3u8").unwrap()
    }

    fn rewrite_default(manifest: &str) -> RewrittenPlaylist {
        rewrite(&base(), manifest, &RewriteOptions::default()).unwrap()
    }

    #[test]
    fn sequence_counter_starts_above_offset() {
        let mut counter = SequenceCounter::new(10_000);
        assert_eq!(counter.next_name("", 5), "10001.ts");
        assert_eq!(counter.next_name("ts/", 5), "ts/10002.ts");
        assert_eq!(counter.next_name("", 8), "00010003.ts");
    }

    #[test]
    fn rewrites_plain_segment_lines() {
        let out = rewrite_default("#EXTM3U\nsegment1.ts\nsegment2.ts");

        assert_eq!(out.links.len(), 2);
        assert_eq!(
            out.links[0].absolute_url.as_str(),
            "https://example.com/a/segment1.ts"
        );
        assert_eq!(
            out.links[1].absolute_url.as_str(),
            "https://example.com/a/segment2.ts"
        );
        assert_eq!(out.links[0].local_path, "10001.ts");
        assert_eq!(out.links[1].local_path, "10002.ts");
        assert_eq!(out.text, "#EXTM3U\n10001.ts\n10002.ts");
        assert!(!out.text.contains("segment1.ts"));
        assert!(!out.text.contains("segment2.ts"));
    }

    #[test]
    fn missing_header_is_a_format_error() {
        let err = rewrite(&base(), "segment1.ts\n#EXTM3U\n", &RewriteOptions::default()).unwrap_err();
        match err {
            MirrorError::Format { line } => assert_eq!(line, "segment1.ts"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(check_header("").is_err());
        assert!(check_header("#EXTM3U-ish\n").is_err());
    }

    #[test]
    fn header_tolerates_bom_and_whitespace() {
        assert!(check_header("\u{feff}#EXTM3U\nseg.ts\n").is_ok());
        assert!(check_header("  #EXTM3U  \r\nseg.ts\r\n").is_ok());
        assert!(check_header("\n\n#EXTM3U\n").is_ok());
    }

    #[test]
    fn key_uri_is_mapped_and_substituted() {
        let manifest = "#EXTM3U\n\
#EXT-X-VERSION:3\n\
#EXT-X-KEY:METHOD=AES-128,URI=\"/keys/k1.key?t=9\",IV=0x00000000000000000000000000000001\n\
#EXTINF:10.0,\n\
seg-1.ts\n\
#EXTINF:10.0,\n\
seg-2.ts\n\
#EXT-X-ENDLIST\n";
        let out = rewrite_default(manifest);

        assert_eq!(out.links.len(), 3);
        assert_eq!(out.links[0].kind, ResourceKind::Key);
        assert_eq!(
            out.links[0].absolute_url.as_str(),
            "https://example.com/keys/k1.key?t=9"
        );
        assert_eq!(out.links[0].local_path, "10001.ts");
        assert_eq!(out.links[1].kind, ResourceKind::Segment);
        assert_eq!(out.links[2].local_path, "10003.ts");
        assert!(out.text.contains(
            "#EXT-X-KEY:METHOD=AES-128,URI=\"10001.ts\",IV=0x00000000000000000000000000000001"
        ));
        assert!(!out.text.contains("k1.key"));
        assert!(out.text.ends_with("#EXT-X-ENDLIST\n"));
    }

    #[test]
    fn key_value_stops_at_closing_quote() {
        let manifest = "#EXTM3U\n#EXT-X-KEY:METHOD=AES-128,URI=\"key.bin\",KEYFORMAT=\"identity\"\nseg.ts\n";
        let out = rewrite_default(manifest);
        assert_eq!(out.links[0].original_reference, "key.bin");
        assert!(out.text.contains("URI=\"10001.ts\",KEYFORMAT=\"identity\""));
    }

    #[test]
    fn repeated_key_is_substituted_everywhere_but_downloaded_once() {
        let mut manifest = String::from("#EXTM3U\n#EXT-X-KEY:METHOD=AES-128,URI=\"k.key\"\n");
        for i in 0..12 {
            manifest.push_str(&format!("#EXTINF:4,\ns{i}.ts\n"));
        }
        // beyond the scan window, but the same key: still substituted
        manifest.push_str("#EXT-X-KEY:METHOD=AES-128,URI=\"k.key\"\ns-last.ts\n");

        let out = rewrite_default(&manifest);
        let keys: Vec<_> = out
            .links
            .iter()
            .filter(|l| l.kind == ResourceKind::Key)
            .collect();
        assert_eq!(keys.len(), 1);
        assert!(!out.text.contains("k.key"));
        assert_eq!(out.text.matches("URI=\"10001.ts\"").count(), 2);
    }

    #[test]
    fn comment_uris_beyond_scan_window_are_left_alone() {
        let mut manifest = String::from("#EXTM3U\n");
        for _ in 0..10 {
            manifest.push_str("#EXT-X-PLACEHOLDER\n");
        }
        // index 11
        manifest.push_str("#EXT-X-KEY:METHOD=AES-128,URI=\"late.key\"\nseg.ts\n");

        let out = rewrite_default(&manifest);
        assert_eq!(out.links.len(), 1);
        assert_eq!(out.links[0].original_reference, "seg.ts");
        assert!(out.text.contains("URI=\"late.key\""));

        let wide = RewriteOptions {
            key_scan_lines: 11,
            ..RewriteOptions::default()
        };
        let out = rewrite(&base(), &manifest, &wide).unwrap();
        assert_eq!(out.links.len(), 2);
        assert_eq!(out.links[0].original_reference, "late.key");
    }

    #[test]
    fn whole_line_replacement_does_not_touch_similar_lines() {
        let out = rewrite_default("#EXTM3U\n1.ts\n11.ts\n#EXTINF:10,1.ts\nx/1.ts\n");
        let lines: Vec<&str> = out.text.split('\n').collect();
        assert_eq!(lines[1], "10001.ts");
        assert_eq!(lines[2], "10002.ts");
        assert_eq!(lines[3], "#EXTINF:10,1.ts");
        assert_eq!(lines[4], "10003.ts");
        assert_eq!(out.links[2].absolute_url.as_str(), "https://example.com/a/x/1.ts");
    }

    #[test]
    fn duplicate_segment_reuses_local_name() {
        let manifest = "#EXTM3U\n#EXT-X-BYTERANGE:100@0\nall.ts\n#EXT-X-BYTERANGE:100@100\nall.ts\n";
        let out = rewrite_default(manifest);
        assert_eq!(out.links.len(), 1);
        assert_eq!(out.text.matches("10001.ts").count(), 2);
    }

    #[test]
    fn preserves_blank_lines_and_line_endings() {
        let out = rewrite_default("#EXTM3U\r\n\r\n  seg.ts  \r\n");
        assert_eq!(out.text, "#EXTM3U\r\n\r\n  10001.ts  \r\n");
    }

    #[test]
    fn prefix_and_width_shape_local_names() {
        let options = RewriteOptions {
            name_prefix: "ts/".to_string(),
            sequence_width: 8,
            ..RewriteOptions::default()
        };
        let out = rewrite(&base(), "#EXTM3U\nsegment1.ts\n", &options).unwrap();
        assert_eq!(out.links[0].local_path, "ts/00010001.ts");
        assert_eq!(out.text, "#EXTM3U\nts/00010001.ts\n");
    }

    #[test]
    fn unresolvable_reference_aborts_rewrite() {
        let err = rewrite(&base(), "#EXTM3U\nhttp://bad host/seg.ts\n", &RewriteOptions::default())
            .unwrap_err();
        assert!(matches!(err, MirrorError::InvalidUrl { .. }));
    }

    #[test]
    fn rewritten_text_references_only_generated_names() {
        let manifest = "#EXTM3U\n\
#EXT-X-TARGETDURATION:6\n\
#EXT-X-MAP:URI=\"init.mp4\"\n\
#EXTINF:6.0,\n\
https://cdn.example.org/v/seg0.m4s?sig=a+b\n\
#EXTINF:6.0,\n\
/v/seg1.m4s\n\
#EXTINF:6.0,\n\
../v/seg2.m4s\n\
#EXT-X-ENDLIST\n";
        let out = rewrite_default(manifest);

        for link in &out.links {
            assert!(!out.text.contains(&link.original_reference));
        }
        let names: HashSet<&str> = out.links.iter().map(|l| l.local_path.as_str()).collect();
        assert_eq!(names.len(), out.links.len());
        for name in names {
            assert_eq!(out.text.matches(name).count(), 1);
        }
    }

    #[test]
    fn rewritten_playlist_still_parses() {
        let manifest = "#EXTM3U\n\
#EXT-X-VERSION:3\n\
#EXT-X-TARGETDURATION:10\n\
#EXT-X-MEDIA-SEQUENCE:0\n\
#EXTINF:9.009,\n\
http://media.example.com/first.ts\n\
#EXTINF:9.009,\n\
second.ts\n\
#EXTINF:3.003,\n\
third.ts\n\
#EXT-X-ENDLIST\n";
        let out = rewrite_default(manifest);

        match m3u8_rs::parse_playlist_res(out.text.as_bytes()).expect("rewritten playlist parses") {
            m3u8_rs::Playlist::MediaPlaylist(pl) => {
                assert_eq!(pl.segments.len(), 3);
                let uris: Vec<&str> = pl.segments.iter().map(|s| s.uri.as_str()).collect();
                assert_eq!(uris, vec!["10001.ts", "10002.ts", "10003.ts"]);
            }
            m3u8_rs::Playlist::MasterPlaylist(_) => panic!("expected media playlist"),
        }
    }
}
