/// Entries shown as tabs with a single current one.
pub(crate) trait Tab {
    fn is_current(&self) -> bool;
    fn set_current(&mut self, current: bool);
}

/// Makes `index` the only current tab.
pub(crate) fn select<T: Tab>(tabs: &mut [T], index: usize) {
    for (position, tab) in tabs.iter_mut().enumerate() {
        tab.set_current(position == index);
    }
}

/// Removes the tab at `index`. When it was current, the tab that moved into
/// its slot becomes current, else the one before it.
pub(crate) fn remove<T: Tab>(tabs: &mut Vec<T>, index: usize) -> T {
    let removed = tabs.remove(index);
    if removed.is_current() && !tabs.is_empty() {
        let next = index.min(tabs.len() - 1);
        select(tabs, next);
    }
    removed
}

pub(crate) fn current<T: Tab>(tabs: &[T]) -> Option<&T> {
    tabs.iter().find(|tab| tab.is_current())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Slot(&'static str, bool);

    impl Tab for Slot {
        fn is_current(&self) -> bool {
            self.1
        }
        fn set_current(&mut self, current: bool) {
            self.1 = current;
        }
    }

    fn slots() -> Vec<Slot> {
        vec![Slot("a", false), Slot("b", true), Slot("c", false)]
    }

    #[test]
    fn removing_current_selects_right_neighbour() {
        let mut tabs = slots();
        remove(&mut tabs, 1);
        assert_eq!(current(&tabs).map(|t| t.0), Some("c"));
    }

    #[test]
    fn removing_last_current_falls_back_to_left() {
        let mut tabs = slots();
        select(&mut tabs, 2);
        remove(&mut tabs, 2);
        assert_eq!(current(&tabs).map(|t| t.0), Some("b"));
    }

    #[test]
    fn removing_other_tab_keeps_selection() {
        let mut tabs = slots();
        remove(&mut tabs, 0);
        assert_eq!(current(&tabs).map(|t| t.0), Some("b"));
        remove(&mut tabs, 0);
        remove(&mut tabs, 0);
        assert!(current(&tabs).is_none());
    }
}
