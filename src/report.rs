//! Digest rendering and message packing
//!
//! Each reported launch becomes one fixed-field text block; blocks are then
//! greedily packed into chat messages that never exceed the transport's
//! per-message character cap and never split a block in two.

use crate::types::{ATTR_FULL_VERSION, ATTR_VERSION, ReportedLaunch};

/// Separator placed between blocks inside one message
pub const BLOCK_SEPARATOR: &str = "\n\n";

/// Placeholder for fields the launch does not carry
const NOT_SPECIFIED: &str = "not specified";

/// Outcome of the defect lookup for one launch
#[derive(Clone, Debug)]
pub enum DefectSummary {
    /// Lookup succeeded; the sorted, deduplicated link list (possibly empty)
    Links(Vec<String>),
    /// Lookup failed; the reason, so the reader knows the list is unknown
    /// rather than empty
    Unavailable(String),
}

/// Render a single launch into a fixed-field text block
///
/// An absent launch renders as a one-line "no data" block carrying the suite
/// label, so the reader sees an explicit gap instead of silence.
pub fn format_launch(
    label: &str,
    reported: Option<&ReportedLaunch>,
    base_url: &str,
    project: &str,
) -> String {
    let Some(reported) = reported else {
        return format!("{label}: no matching launches in the reporting window");
    };

    let launch = &reported.launch;
    let meta = &reported.meta;
    let stats = &launch.statistics.executions;

    // Wire attributes win; the resolved metadata is the fallback
    let version = launch
        .attribute(ATTR_FULL_VERSION)
        .or_else(|| launch.attribute(ATTR_VERSION))
        .or(meta.version.as_deref())
        .unwrap_or(NOT_SPECIFIED);
    let branch = meta.branch.as_deref().unwrap_or(NOT_SPECIFIED);
    let commit = meta.commit.as_deref().unwrap_or(NOT_SPECIFIED);

    format!(
        "{label}\n\
         Launch ID: {id}\n\
         Version: {version}\n\
         Branch: {branch}\n\
         Commit: {commit}\n\
         Name: {name}\n\
         Total tests: {total}\n\
         Passed: {passed}\n\
         Failed: {failed}\n\
         Skipped: {skipped}\n\
         Status: {status}\n\
         Started: {started}\n\
         Link: {base_url}/ui/#{project}/launches/all/{id}",
        id = launch.id,
        name = launch.name,
        total = stats.total,
        passed = stats.passed,
        failed = stats.failed,
        skipped = stats.skipped,
        status = launch.status,
        started = launch.start_time.to_rfc3339(),
    )
}

/// Header of the first defect block
const DEFECT_HEADER: &str = "Defect links:";

/// Header of defect blocks continuing a list that outgrew one block
const DEFECT_HEADER_CONTINUED: &str = "Defect links (continued):";

/// Render the defect section as packable blocks, each at most `max_len`
///
/// A short list yields a single block. A list that would outgrow one block
/// continues in follow-up blocks so no block ever exceeds the transport cap.
/// A single link too long to fit a block on its own is truncated.
pub fn format_defect_blocks(summary: &DefectSummary, max_len: usize) -> Vec<String> {
    let links = match summary {
        DefectSummary::Unavailable(reason) => {
            return vec![format!("Defect links: unavailable, reason: {reason}")];
        }
        DefectSummary::Links(links) if links.is_empty() => {
            return vec!["Defect links: none found".to_string()];
        }
        DefectSummary::Links(links) => links,
    };

    let line_budget = max_len.saturating_sub(DEFECT_HEADER_CONTINUED.len() + 1);
    let mut blocks = Vec::new();
    let mut current = DEFECT_HEADER.to_string();
    for link in links {
        let line = truncate_to(link, line_budget);
        if current.len() + 1 + line.len() > max_len {
            blocks.push(std::mem::replace(
                &mut current,
                DEFECT_HEADER_CONTINUED.to_string(),
            ));
        }
        current.push('\n');
        current.push_str(line);
    }
    blocks.push(current);
    blocks
}

/// Greedily pack text blocks into messages of at most `max_len` characters
///
/// Blocks are joined with [`BLOCK_SEPARATOR`] and never split: when the next
/// block would push the current message over the cap, the message is flushed
/// and a new one started. Block order is preserved. A single block longer
/// than `max_len` is truncated on a character boundary rather than split, so
/// every produced message fits the cap.
pub fn assemble_report(blocks: &[String], max_len: usize) -> Vec<String> {
    let mut messages = Vec::new();
    let mut current = String::new();

    for block in blocks {
        if block.is_empty() {
            continue;
        }
        if current.is_empty() {
            current.push_str(truncate_to(block, max_len));
        } else if current.len() + BLOCK_SEPARATOR.len() + block.len() <= max_len {
            current.push_str(BLOCK_SEPARATOR);
            current.push_str(block);
        } else {
            messages.push(std::mem::take(&mut current));
            current.push_str(truncate_to(block, max_len));
        }
    }
    if !current.is_empty() {
        messages.push(current);
    }
    messages
}

/// Longest prefix of `text` at most `max_len` bytes, cut on a char boundary
fn truncate_to(text: &str, max_len: usize) -> &str {
    if text.len() <= max_len {
        return text;
    }
    let mut end = max_len;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
