/// Vertical pager state for the reels viewer. One post fills the screen;
/// `active` names the post that currently owns playback.
#[derive(Debug, Clone, Default)]
pub struct Pager {
    count: usize,
    active: usize,
    offset: f64,
}

impl Pager {
    pub fn new(count: usize, start: usize) -> Self {
        let mut pager = Pager {
            count,
            active: 0,
            offset: 0.0,
        };
        pager.jump_to(start);
        pager
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn active(&self) -> usize {
        self.active
    }

    pub fn scroll_offset(&self) -> f64 {
        self.offset
    }

    /// The provider appended (or replaced) pages; keep the pager in range.
    pub fn set_count(&mut self, count: usize) {
        self.count = count;
        if count == 0 {
            self.active = 0;
            self.offset = 0.0;
        } else if self.active >= count {
            self.jump_to(count - 1);
        }
    }

    /// Moves to the next post. Past the last one this is a no-op.
    pub fn next(&mut self) -> bool {
        if self.count == 0 || self.active + 1 >= self.count {
            return false;
        }
        self.jump_to(self.active + 1);
        true
    }

    /// Moves to the previous post. Before the first one this is a no-op.
    pub fn prev(&mut self) -> bool {
        if self.active == 0 {
            return false;
        }
        self.jump_to(self.active - 1);
        true
    }

    pub fn jump_to(&mut self, index: usize) {
        if self.count == 0 {
            self.active = 0;
            self.offset = 0.0;
            return;
        }
        self.active = index.min(self.count - 1);
        self.offset = self.active as f64;
    }

    /// Mid-scroll the active post is whichever one covers at least half the
    /// viewport, so activation flips exactly at the halfway point.
    pub fn set_scroll_offset(&mut self, offset: f64) {
        if self.count == 0 || !offset.is_finite() {
            return;
        }
        let max = (self.count - 1) as f64;
        self.offset = offset.clamp(0.0, max);
        self.active = self.offset.round() as usize;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_clamp_at_the_ends() {
        let mut pager = Pager::new(3, 0);
        assert!(!pager.prev());
        assert_eq!(pager.active(), 0);

        assert!(pager.next());
        assert!(pager.next());
        assert_eq!(pager.active(), 2);

        assert!(!pager.next());
        assert_eq!(pager.active(), 2);

        assert!(pager.prev());
        assert_eq!(pager.active(), 1);
    }

    #[test]
    fn fractional_offset_activates_the_covering_post() {
        let mut pager = Pager::new(4, 0);
        pager.set_scroll_offset(1.4);
        assert_eq!(pager.active(), 1);
        pager.set_scroll_offset(1.5);
        assert_eq!(pager.active(), 2);
        pager.set_scroll_offset(-2.0);
        assert_eq!(pager.active(), 0);
        pager.set_scroll_offset(99.0);
        assert_eq!(pager.active(), 3);
    }

    #[test]
    fn start_index_and_count_changes_stay_in_range() {
        let pager = Pager::new(3, 99);
        assert_eq!(pager.active(), 2);

        let mut pager = Pager::new(5, 4);
        pager.set_count(2);
        assert_eq!(pager.active(), 1);

        pager.set_count(0);
        assert_eq!(pager.active(), 0);
        assert!(pager.is_empty());
        assert!(!pager.next());
        assert!(!pager.prev());
    }

    #[test]
    fn appended_pages_extend_the_runway() {
        let mut pager = Pager::new(2, 1);
        assert!(!pager.next());
        pager.set_count(4);
        assert!(pager.next());
        assert_eq!(pager.active(), 2);
    }
}
