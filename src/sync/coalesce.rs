use crate::error::Result;
use crate::models::UpdateEntry;
use tracing::instrument;

/// A run of contiguous rows written with a single range update.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub start: u32,
    pub end: u32,
    pub entries: Vec<UpdateEntry>,
}

impl Block {
    fn seed(ordinal: u32, entry: UpdateEntry) -> Self {
        Self {
            start: ordinal,
            end: ordinal,
            entries: vec![entry],
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `top-left:bottom-right` of the rows in this block.
    pub fn first_address(&self) -> &str {
        self.entries[0].address.first()
    }

    pub fn last_address(&self) -> &str {
        self.entries[self.entries.len() - 1].address.last()
    }
}

/// Group updates into maximal blocks of consecutive rows.
///
/// Entries must already be ordered by row; a gap closes the current block.
#[instrument(name = "Coalescing updates", skip_all, fields(updates = updates.len()))]
pub fn coalesce(updates: Vec<UpdateEntry>) -> Result<Vec<Block>> {
    let mut blocks: Vec<Block> = Vec::new();

    for entry in updates {
        let ordinal = entry.address.ordinal()?;

        match blocks.last_mut() {
            Some(current) if current.end.checked_add(1) == Some(ordinal) => {
                current.end = ordinal;
                current.entries.push(entry);
            }
            _ => blocks.push(Block::seed(ordinal, entry)),
        }
    }

    Ok(blocks)
}

#[cfg(test)]
pub(crate) mod test_helpers {
    use crate::address::RowAddress;
    use crate::models::UpdateEntry;

    pub(crate) fn entry(row: u32) -> UpdateEntry {
        UpdateEntry {
            address: RowAddress::for_row(row, 4).unwrap(),
            values: vec!["Y".to_string(), "SUCCESS".to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_helpers::entry;
    use super::*;
    use crate::address::RowAddress;
    use crate::error::AppError;

    fn spans(blocks: &[Block]) -> Vec<(u32, u32)> {
        blocks.iter().map(|b| (b.start, b.end)).collect()
    }

    fn assert_invariants(input_len: usize, blocks: &[Block]) {
        let total: usize = blocks.iter().map(Block::len).sum();
        assert_eq!(total, input_len, "every entry lands in exactly one block");

        for block in blocks {
            assert_eq!((block.end - block.start + 1) as usize, block.len());
            for (offset, entry) in block.entries.iter().enumerate() {
                assert_eq!(entry.address.ordinal().unwrap(), block.start + offset as u32);
            }
        }

        for pair in blocks.windows(2) {
            assert!(
                pair[0].end + 1 < pair[1].start,
                "blocks {:?} and {:?} should have been merged",
                (pair[0].start, pair[0].end),
                (pair[1].start, pair[1].end)
            );
        }
    }

    #[test]
    fn test_coalesce_empty() {
        assert!(coalesce(vec![]).unwrap().is_empty());
    }

    #[test]
    fn test_coalesce_single() {
        let blocks = coalesce(vec![entry(8)]).unwrap();
        assert_eq!(spans(&blocks), vec![(8, 8)]);
        assert_eq!(blocks[0].first_address(), "A8");
        assert_eq!(blocks[0].last_address(), "D8");
    }

    #[test]
    fn test_coalesce_mixed_runs() {
        let rows = [3, 4, 5, 9, 10, 14];
        let blocks = coalesce(rows.iter().map(|r| entry(*r)).collect()).unwrap();

        assert_eq!(spans(&blocks), vec![(3, 5), (9, 10), (14, 14)]);
        assert_eq!(blocks[0].first_address(), "A3");
        assert_eq!(blocks[0].last_address(), "D5");
        assert_invariants(rows.len(), &blocks);
    }

    #[test]
    fn test_coalesce_all_contiguous() {
        let blocks = coalesce((2..=40).map(entry).collect()).unwrap();
        assert_eq!(spans(&blocks), vec![(2, 40)]);
        assert_invariants(39, &blocks);
    }

    #[test]
    fn test_coalesce_all_scattered() {
        let rows = [2, 4, 6, 8];
        let blocks = coalesce(rows.iter().map(|r| entry(*r)).collect()).unwrap();
        assert_eq!(spans(&blocks), vec![(2, 2), (4, 4), (6, 6), (8, 8)]);
        assert_invariants(rows.len(), &blocks);
    }

    #[test]
    fn test_coalesce_uses_first_cell_of_each_row() {
        let qualified = |row: u32| UpdateEntry {
            address: RowAddress::new(vec![
                format!("incoming!B{row}"),
                format!("incoming!C{row}"),
            ])
            .unwrap(),
            values: vec![],
        };

        let blocks = coalesce(vec![qualified(11), qualified(12)]).unwrap();
        assert_eq!(spans(&blocks), vec![(11, 12)]);
        assert_eq!(blocks[0].first_address(), "incoming!B11");
        assert_eq!(blocks[0].last_address(), "incoming!C12");
    }

    #[test]
    fn test_coalesce_does_not_reorder() {
        let blocks = coalesce(vec![entry(7), entry(3), entry(4)]).unwrap();
        assert_eq!(spans(&blocks), vec![(7, 7), (3, 4)]);
    }

    #[test]
    fn test_coalesce_malformed_address() {
        let bad = UpdateEntry {
            address: RowAddress::new(vec!["XYZ".to_string()]).unwrap(),
            values: vec![],
        };
        assert!(matches!(
            coalesce(vec![entry(1), bad]),
            Err(AppError::MalformedAddress(_))
        ));
    }
}
