use crate::capture::buffer::RetentionBuffer;
use crate::models::filter::filter_at;
use crate::models::packet::PacketRecord;

/// Pick the records to show, newest first.
///
/// A record qualifies when its label passes the filter at `filter_index` and,
/// for a non-empty `search`, either endpoint contains it ignoring case. An
/// index outside the filter table lets every label through. The scan walks
/// back from the newest record and stops after `max_results` matches.
pub fn select<'a>(
    buffer: &'a RetentionBuffer,
    filter_index: usize,
    search: &str,
    max_results: usize,
) -> Vec<&'a PacketRecord> {
    let filter = filter_at(filter_index);
    let needle = search.trim().to_lowercase();

    buffer
        .iter_newest_first()
        .filter(|record| filter.map_or(true, |f| f.matches(record.protocol)))
        .filter(|record| needle.is_empty() || record.endpoint_contains(&needle))
        .take(max_results)
        .collect()
}
