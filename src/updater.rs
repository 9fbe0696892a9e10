//! Applying content and movement updates to board sections.
//!
//! Producers (timetable clients, the HTTP API) send per-section updates:
//! optionally new content, optionally a new movement, and a "continue
//! movement" flag. A whole batch is applied under one board lock, so the
//! next animator tick sees all of it or none of it.

use crate::board::{BoardSection, SectionContent};
use crate::movement::Movement;
use crate::{SharedBoard, lock_board};
use serde::Serialize;

/// One section's worth of changes.
#[derive(Clone, Debug, Default)]
pub struct SectionUpdate {
    pub content: Option<SectionContent>,
    pub movement: Option<Movement>,
    /// Keep the running movement if the new content has the same size as
    /// the current one (e.g. refreshed text in an identical layout).
    pub continue_movement: bool,
}

/// Outcome of one section update.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SectionStatus {
    Ok,
    SectionNotExists,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct SectionOperationStatus {
    pub section_index: u32,
    pub status: SectionStatus,
}

/// Apply `update` to `section`.
///
/// Content and movement are replaced independently. A supplied movement
/// replaces the current one and restarts the section, unless
/// `continue_movement` is set and the new content has exactly the current
/// content's size.
pub fn apply_section_update(section: &mut BoardSection, update: SectionUpdate) {
    let mut change_movement = true;

    if let Some(content) = update.content {
        if update.continue_movement && content.size() == section.content().size() {
            change_movement = false;
        }
        section.update_content(content);
    }

    if let Some(movement) = update.movement {
        if change_movement {
            section.update_movement(movement);
            section.reset();
        }
    }
}

/// Apply a batch of `(section_index, update)` pairs under a single lock.
///
/// Out-of-range indices are skipped and reported as `SectionNotExists`;
/// the rest of the batch is still applied. Statuses come back in request
/// order.
pub fn update_sections(
    board: &SharedBoard,
    updates: Vec<(u32, SectionUpdate)>,
) -> Vec<SectionOperationStatus> {
    let mut board = lock_board(board);

    updates
        .into_iter()
        .map(|(section_index, update)| {
            let status = match board.section_mut(section_index as usize) {
                Some(section) => {
                    tracing::debug!(
                        "Updating section {}: content={} movement={} continue={}",
                        section_index,
                        update.content.is_some(),
                        update.movement.is_some(),
                        update.continue_movement
                    );
                    apply_section_update(section, update);
                    SectionStatus::Ok
                }
                None => {
                    tracing::warn!("Update for non-existent section {}", section_index);
                    SectionStatus::SectionNotExists
                }
            };

            SectionOperationStatus {
                section_index,
                status,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movement::Offset;
    use crate::{BoardConfig, Color, Pixel, shared_board};
    use pretty_assertions::assert_eq;

    fn content(w: i32, h: i32) -> SectionContent {
        SectionContent::new(vec![Pixel::new(0, 0, Color::WHITE)], w, h)
    }

    /// A section that has already scrolled a few steps.
    fn scrolled_section() -> BoardSection {
        let mut section = BoardSection::new(
            crate::SectionArea::new(0, 0, 192, 10),
            content(100, 10),
            Movement::scrolling(10, 0, -1, 0),
        );
        section.reset();
        section.update(30).unwrap();
        assert_eq!(section.movement().offset(), Offset::new(-4, 0));
        section
    }

    #[test]
    fn continue_movement_keeps_scroll_for_same_size_content() {
        let mut section = scrolled_section();
        apply_section_update(
            &mut section,
            SectionUpdate {
                content: Some(content(100, 10)),
                movement: Some(Movement::scrolling(10, 0, -1, 0)),
                continue_movement: true,
            },
        );
        assert_eq!(section.movement().offset(), Offset::new(-4, 0));
        assert!(section.has_changed());
    }

    #[test]
    fn continue_movement_restarts_for_resized_content() {
        let mut section = scrolled_section();
        apply_section_update(
            &mut section,
            SectionUpdate {
                content: Some(content(120, 10)),
                movement: Some(Movement::scrolling(10, 0, -1, 0)),
                continue_movement: true,
            },
        );
        assert_eq!(section.movement().offset(), Offset::new(-1, 0));
        assert_eq!(section.content().content_w(), 120);
    }

    #[test]
    fn movement_without_continue_restarts() {
        let mut section = scrolled_section();
        apply_section_update(
            &mut section,
            SectionUpdate {
                content: Some(content(100, 10)),
                movement: Some(Movement::none().with_initial_offset(2, 0)),
                continue_movement: false,
            },
        );
        assert_eq!(section.movement().offset(), Offset::new(2, 0));
        assert!(section.movement().is_started());
    }

    #[test]
    fn content_only_update_keeps_movement() {
        let mut section = scrolled_section();
        apply_section_update(
            &mut section,
            SectionUpdate {
                content: Some(content(50, 10)),
                ..Default::default()
            },
        );
        assert_eq!(section.movement().offset(), Offset::new(-4, 0));
        assert_eq!(section.content().content_w(), 50);
    }

    #[test]
    fn movement_only_update_keeps_content() {
        let mut section = scrolled_section();
        apply_section_update(
            &mut section,
            SectionUpdate {
                movement: Some(Movement::static_content(0)),
                continue_movement: true,
                ..Default::default()
            },
        );
        assert_eq!(section.content().content_w(), 100);
        assert_eq!(section.movement().offset(), Offset::new(0, 0));
    }

    #[test]
    fn batch_reports_missing_sections_and_applies_the_rest() {
        let board = shared_board(BoardConfig::default().build_board());

        let statuses = update_sections(
            &board,
            vec![
                (
                    0,
                    SectionUpdate {
                        content: Some(content(10, 10)),
                        ..Default::default()
                    },
                ),
                (3, SectionUpdate::default()),
                (
                    2,
                    SectionUpdate {
                        content: Some(content(20, 10)),
                        ..Default::default()
                    },
                ),
            ],
        );

        assert_eq!(
            statuses,
            vec![
                SectionOperationStatus {
                    section_index: 0,
                    status: SectionStatus::Ok
                },
                SectionOperationStatus {
                    section_index: 3,
                    status: SectionStatus::SectionNotExists
                },
                SectionOperationStatus {
                    section_index: 2,
                    status: SectionStatus::Ok
                },
            ]
        );

        let board = lock_board(&board);
        assert_eq!(board.sections()[0].content().content_w(), 10);
        assert_eq!(board.sections()[1].content().content_w(), 0);
        assert_eq!(board.sections()[2].content().content_w(), 20);
    }

    #[test]
    fn status_serializes_in_screaming_snake_case() {
        let json = serde_json::to_string(&SectionStatus::SectionNotExists).unwrap();
        assert_eq!(json, "\"SECTION_NOT_EXISTS\"");
    }
}
