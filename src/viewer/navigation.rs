//! Page navigation state machine
//!
//! Owns the page index, display mode and rotation for one open document.
//! Every command either mutates the state and reports the follow-up work
//! as a list of [`Effect`]s, or leaves the state untouched and explains why
//! through a [`Notification`].

use log::debug;
use serde::Serialize;

use super::types::{DisplayMode, HalfSide, Rotation};
use crate::progress::ReadingProgress;

/// Viewer state for an open document
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ViewerState {
    current_page: usize,
    page_count: usize,
    display_mode: DisplayMode,
    rotation: Rotation,
    night_mode: bool,
}

impl ViewerState {
    /// Fresh state at the first page in single mode
    #[must_use]
    pub fn new(page_count: usize, night_mode: bool) -> Self {
        Self {
            current_page: 0,
            page_count,
            display_mode: DisplayMode::Single,
            rotation: Rotation::Deg0,
            night_mode,
        }
    }

    /// State rebuilt from persisted progress.
    ///
    /// The stored page may no longer exist if the document shrank, so it is
    /// clamped to the last page and re-aligned to a spread anchor if needed.
    #[must_use]
    pub fn restored(page_count: usize, progress: &ReadingProgress, night_mode: bool) -> Self {
        let mut state = Self {
            current_page: progress.page_index.min(page_count.saturating_sub(1)),
            page_count,
            display_mode: progress.display_mode,
            rotation: progress.rotation,
            night_mode,
        };
        if state.display_mode == DisplayMode::DoubleSpread {
            state.current_page = spread_anchor(state.current_page);
        }
        state
    }

    /// Current page (0-indexed); the spread anchor in double-spread mode
    #[must_use]
    pub fn current_page(&self) -> usize {
        self.current_page
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    #[must_use]
    pub fn display_mode(&self) -> DisplayMode {
        self.display_mode
    }

    #[must_use]
    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    #[must_use]
    pub fn night_mode(&self) -> bool {
        self.night_mode
    }

    /// Progress record to persist for this state
    #[must_use]
    pub fn progress(&self) -> ReadingProgress {
        ReadingProgress {
            page_index: self.current_page,
            display_mode: self.display_mode,
            rotation: self.rotation,
        }
    }

    /// Pages visible in the current mode, left slot first
    #[must_use]
    pub fn visible_pages(&self) -> Vec<usize> {
        if self.page_count == 0 {
            return Vec::new();
        }
        match self.display_mode {
            DisplayMode::DoubleSpread => {
                let partner = self.current_page + 1;
                if partner < self.page_count {
                    vec![self.current_page, partner]
                } else {
                    vec![self.current_page]
                }
            }
            _ => vec![self.current_page],
        }
    }

    /// Human readable position, e.g. `3/10`, `3/10 (L)` or `3-4/10`
    #[must_use]
    pub fn page_label(&self) -> String {
        let total = self.page_count;
        match (self.display_mode, self.visible_pages().as_slice()) {
            (_, []) => format!("0/{total}"),
            (DisplayMode::HalfPage { side }, [page]) => {
                format!("{}/{total} ({})", page + 1, side.as_str())
            }
            (DisplayMode::DoubleSpread, [left, right]) => {
                format!("{}-{}/{total}", left + 1, right + 1)
            }
            (_, [page, ..]) => format!("{}/{total}", page + 1),
        }
    }

    /// Apply a command and return resulting effects
    pub fn apply(&mut self, cmd: Command) -> Result<Vec<Effect>, Notification> {
        let before = self.clone();
        let effects = match cmd {
            Command::Next => self.next()?,
            Command::Prev => self.prev()?,
            Command::JumpTo(page) => self.jump_to(page)?,
            Command::ToggleHalfPage => {
                self.display_mode = match self.display_mode {
                    DisplayMode::HalfPage { .. } => DisplayMode::Single,
                    _ => DisplayMode::HalfPage {
                        side: HalfSide::Right,
                    },
                };
                Self::redraw_effects()
            }
            Command::ToggleDoubleSpread => {
                self.display_mode = match self.display_mode {
                    DisplayMode::DoubleSpread => DisplayMode::Single,
                    _ => {
                        self.current_page = spread_anchor(self.current_page);
                        DisplayMode::DoubleSpread
                    }
                };
                Self::redraw_effects()
            }
            Command::Rotate => {
                self.rotation = self.rotation.next();
                Self::redraw_effects()
            }
            Command::ToggleNightMode => {
                self.night_mode = !self.night_mode;
                vec![Effect::Recolor, Effect::SavePreferences]
            }
        };

        if *self == before {
            return Ok(Vec::new());
        }

        debug!(
            "{cmd:?}: page {} -> {}, mode {} -> {}",
            before.current_page,
            self.current_page,
            before.display_mode.as_str(),
            self.display_mode.as_str()
        );
        Ok(effects)
    }

    fn next(&mut self) -> Result<Vec<Effect>, Notification> {
        let last = self.last_page()?;
        match self.display_mode {
            DisplayMode::Single => {
                if self.current_page >= last {
                    return Err(Notification::AtLastPage);
                }
                self.current_page += 1;
            }
            DisplayMode::HalfPage {
                side: HalfSide::Right,
            } => {
                self.display_mode = DisplayMode::HalfPage {
                    side: HalfSide::Left,
                };
            }
            DisplayMode::HalfPage {
                side: HalfSide::Left,
            } => {
                if self.current_page >= last {
                    return Err(Notification::AtLastPage);
                }
                self.current_page += 1;
                self.display_mode = DisplayMode::HalfPage {
                    side: HalfSide::Right,
                };
            }
            DisplayMode::DoubleSpread => {
                let next_anchor = self.current_page + 2;
                if next_anchor > last {
                    return Err(Notification::AtLastPage);
                }
                self.current_page = next_anchor;
            }
        }
        Ok(Self::redraw_effects())
    }

    fn prev(&mut self) -> Result<Vec<Effect>, Notification> {
        self.last_page()?;
        match self.display_mode {
            DisplayMode::Single => {
                if self.current_page == 0 {
                    return Err(Notification::AtFirstPage);
                }
                self.current_page -= 1;
            }
            DisplayMode::HalfPage {
                side: HalfSide::Left,
            } => {
                self.display_mode = DisplayMode::HalfPage {
                    side: HalfSide::Right,
                };
            }
            DisplayMode::HalfPage {
                side: HalfSide::Right,
            } => {
                if self.current_page == 0 {
                    return Err(Notification::AtFirstPage);
                }
                self.current_page -= 1;
                self.display_mode = DisplayMode::HalfPage {
                    side: HalfSide::Left,
                };
            }
            DisplayMode::DoubleSpread => {
                if self.current_page < 2 {
                    return Err(Notification::AtFirstPage);
                }
                self.current_page -= 2;
            }
        }
        Ok(Self::redraw_effects())
    }

    /// `page` is 1-based, as typed by the user
    fn jump_to(&mut self, page: usize) -> Result<Vec<Effect>, Notification> {
        self.last_page()?;
        if page == 0 || page > self.page_count {
            return Err(Notification::InvalidJumpTarget {
                target: page,
                page_count: self.page_count,
            });
        }

        let index = page - 1;
        match self.display_mode {
            DisplayMode::Single => self.current_page = index,
            DisplayMode::HalfPage { .. } => {
                self.current_page = index;
                self.display_mode = DisplayMode::HalfPage {
                    side: HalfSide::Right,
                };
            }
            DisplayMode::DoubleSpread => self.current_page = spread_anchor(index),
        }
        Ok(Self::redraw_effects())
    }

    fn last_page(&self) -> Result<usize, Notification> {
        self.page_count
            .checked_sub(1)
            .ok_or(Notification::EmptyDocument)
    }

    /// Shown content changed: new pages, another half, or new geometry
    fn redraw_effects() -> Vec<Effect> {
        vec![Effect::ResetTransform, Effect::Rerender, Effect::SaveProgress]
    }
}

/// First page of the spread containing `page`. Spreads pair `(2k, 2k + 1)`.
#[must_use]
pub fn spread_anchor(page: usize) -> usize {
    page - page % 2
}

/// Commands that modify viewer state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Advance in reading order
    Next,
    /// Go back in reading order
    Prev,
    /// Jump to a 1-based page number
    JumpTo(usize),
    ToggleHalfPage,
    ToggleDoubleSpread,
    /// Rotate a quarter turn clockwise
    Rotate,
    ToggleNightMode,
}

/// Effects produced by state changes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Pan and zoom must start over for the new content
    ResetTransform,
    /// Resolve a new render plan and rasterize it
    Rerender,
    /// Re-run the color pass over existing rasters
    Recolor,
    /// Persist the per-document progress record
    SaveProgress,
    /// Persist user preferences
    SavePreferences,
}

/// Reasons a command left the state unchanged
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Notification {
    #[error("Already at the first page")]
    AtFirstPage,

    #[error("Already at the last page")]
    AtLastPage,

    #[error("Page {target} is out of range (1 - {page_count})")]
    InvalidJumpTarget { target: usize, page_count: usize },

    #[error("Document has no pages")]
    EmptyDocument,
}
