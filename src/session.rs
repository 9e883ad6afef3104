/// In-process navigation state. Nothing here is persisted; closing the app
/// forgets where the user was.

/// How many ticks a scroll restore keeps waiting for the list to grow back
/// before it settles for the nearest position.
pub const RESTORE_RETRY_LIMIT: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    Feed,
    Bookmarks,
    ReelsGrid,
    /// Full-screen viewer, opened on a specific post.
    ReelsViewer { post_id: String },
    Templates,
    Editor { template_id: String },
}

/// Where a list screen was when the user left it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewState {
    pub selected: usize,
    pub offset: usize,
}

/// Screens the user walked through, with the position each one was left at.
/// Escape pops one frame and the popped state is restored verbatim.
#[derive(Debug, Default)]
pub struct NavStack {
    frames: Vec<(Screen, ViewState)>,
}

impl NavStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, screen: Screen, state: ViewState) {
        self.frames.push((screen, state));
    }

    pub fn pop(&mut self) -> Option<(Screen, ViewState)> {
        self.frames.pop()
    }

    pub fn peek(&self) -> Option<&(Screen, ViewState)> {
        self.frames.last()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreStep {
    /// The list has not grown back to the saved position yet; ask again
    /// next tick.
    Pending,
    /// Apply this state and stop retrying.
    Apply(ViewState),
}

/// A saved position being re-applied to a list that may still be loading.
/// Retries are bounded; when they run out the restore clamps to whatever
/// the list currently holds.
#[derive(Debug, Clone, Copy)]
pub struct ScrollRestore {
    target: ViewState,
    retries_left: u32,
}

impl ScrollRestore {
    pub fn new(target: ViewState) -> Self {
        Self {
            target,
            retries_left: RESTORE_RETRY_LIMIT,
        }
    }

    pub fn target(&self) -> ViewState {
        self.target
    }

    pub fn step(&mut self, len: usize) -> RestoreStep {
        if len > self.target.selected {
            return RestoreStep::Apply(self.target);
        }
        if self.retries_left == 0 {
            let selected = len.saturating_sub(1);
            return RestoreStep::Apply(ViewState {
                selected,
                offset: self.target.offset.min(selected),
            });
        }
        self.retries_left -= 1;
        RestoreStep::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pop_returns_the_saved_context_verbatim() {
        let mut nav = NavStack::new();
        nav.push(
            Screen::Feed,
            ViewState {
                selected: 17,
                offset: 12,
            },
        );
        nav.push(
            Screen::ReelsViewer {
                post_id: "42".into(),
            },
            ViewState::default(),
        );

        let (screen, _) = nav.pop().unwrap();
        assert_eq!(
            screen,
            Screen::ReelsViewer {
                post_id: "42".into()
            }
        );

        let (screen, state) = nav.pop().unwrap();
        assert_eq!(screen, Screen::Feed);
        assert_eq!(state.selected, 17);
        assert_eq!(state.offset, 12);
        assert!(nav.pop().is_none());
    }

    #[test]
    fn restore_applies_once_the_list_is_long_enough() {
        let target = ViewState {
            selected: 8,
            offset: 5,
        };
        let mut restore = ScrollRestore::new(target);
        assert_eq!(restore.step(3), RestoreStep::Pending);
        assert_eq!(restore.step(8), RestoreStep::Pending);
        assert_eq!(restore.step(9), RestoreStep::Apply(target));
    }

    #[test]
    fn restore_gives_up_clamped_after_the_retry_budget() {
        let mut restore = ScrollRestore::new(ViewState {
            selected: 50,
            offset: 44,
        });
        for _ in 0..RESTORE_RETRY_LIMIT {
            assert_eq!(restore.step(4), RestoreStep::Pending);
        }
        assert_eq!(
            restore.step(4),
            RestoreStep::Apply(ViewState {
                selected: 3,
                offset: 3,
            })
        );
    }

    #[test]
    fn restore_on_an_empty_list_lands_at_zero() {
        let mut restore = ScrollRestore::new(ViewState {
            selected: 2,
            offset: 1,
        });
        for _ in 0..RESTORE_RETRY_LIMIT {
            restore.step(0);
        }
        assert_eq!(
            restore.step(0),
            RestoreStep::Apply(ViewState {
                selected: 0,
                offset: 0,
            })
        );
    }
}
