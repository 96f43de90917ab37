//! Tag index operations.
//!
//! Removing an entry only marks the index dirty. Every read of the index
//! that could expose an id purges dangling ids first.

use super::Event;

impl Event {
    /// Adds `id` to `tag`, creating the tag if needed.
    ///
    /// Returns false, leaving the index untouched, if the event has no
    /// entry `id`. Tagging an id twice under the same tag has no effect.
    pub fn tag_entry(&mut self, id: u64, tag: &str) -> bool {
        if !self.entries.contains_key(&id) {
            return false;
        }
        match self.tags.get_mut(tag) {
            Some(ids) => {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
            None => {
                self.tags.insert(tag.to_string(), vec![id]);
            }
        }
        true
    }

    /// Removes `id` from `tag`. Absent tags and ids are ignored.
    pub fn untag_entry(&mut self, id: u64, tag: &str) {
        if let Some(ids) = self.tags.get_mut(tag) {
            ids.retain(|x| *x != id);
        }
    }

    /// Drops a tag and its id list.
    pub fn delete_tag(&mut self, tag: &str) -> bool {
        self.tags.remove(tag).is_some()
    }

    /// Tag names in sorted order.
    pub fn tags(&self) -> Vec<&str> {
        self.tags.keys().map(String::as_str).collect()
    }

    /// Ids under `tag` in the order they were tagged.
    pub fn tagged_entries(&mut self, tag: &str) -> Vec<u64> {
        self.purge_dangling_tags();
        self.tags.get(tag).cloned().unwrap_or_default()
    }

    /// Sorted names of every tag that references `id`.
    ///
    /// This scans the whole index.
    pub fn entry_tags(&mut self, id: u64) -> Vec<&str> {
        self.purge_dangling_tags();
        self.tags
            .iter()
            .filter(|(_, ids)| ids.contains(&id))
            .map(|(tag, _)| tag.as_str())
            .collect()
    }

    pub(super) fn purge_dangling_tags(&mut self) {
        if !self.dirty_tags {
            return;
        }
        let entries = &self.entries;
        for ids in self.tags.values_mut() {
            ids.retain(|id| entries.contains_key(id));
        }
        self.dirty_tags = false;
    }
}

#[cfg(test)]
mod tests {
    use crate::event::tests::Note;
    use crate::event::Event;

    fn event_with(n: usize) -> (Event, Vec<u64>) {
        let mut event = Event::new();
        let ids = (0..n)
            .map(|i| event.add_entry("", Box::new(Note::new(&format!("n{i}")))))
            .collect();
        (event, ids)
    }

    #[test]
    fn tag_order_is_insertion_order() {
        let (mut event, ids) = event_with(3);
        event.tag_entry(ids[2], "b");
        event.tag_entry(ids[0], "b");
        event.tag_entry(ids[2], "b");
        event.tag_entry(ids[1], "a");
        assert_eq!(event.tags(), vec!["a", "b"]);
        assert_eq!(event.tagged_entries("b"), vec![ids[2], ids[0]]);
        assert!(event.tagged_entries("missing").is_empty());
    }

    #[test]
    fn untag_ignores_absent() {
        let (mut event, ids) = event_with(2);
        event.tag_entry(ids[0], "t");
        event.untag_entry(ids[1], "t");
        event.untag_entry(ids[0], "nope");
        assert_eq!(event.tagged_entries("t"), vec![ids[0]]);
        event.untag_entry(ids[0], "t");
        assert!(event.tagged_entries("t").is_empty());
    }

    #[test]
    fn removal_purges_lazily() {
        let (mut event, ids) = event_with(3);
        for id in &ids {
            event.tag_entry(*id, "all");
        }
        event.tag_entry(ids[1], "odd");

        assert!(event.remove_entry(ids[1]));
        assert!(event.dirty_tags);
        assert_eq!(event.tags["odd"], vec![ids[1]]);

        assert_eq!(event.tagged_entries("all"), vec![ids[0], ids[2]]);
        assert!(!event.dirty_tags);
        assert!(event.tagged_entries("odd").is_empty());
        assert!(event.entry_tags(ids[1]).is_empty());
    }

    #[test]
    fn unknown_ids_are_not_tagged() {
        let (mut event, ids) = event_with(1);
        assert!(!event.tag_entry(7, "t"));
        assert!(event.tags().is_empty());
        assert!(event.tag_entry(ids[0], "t"));

        assert!(event.remove_entry(ids[0]));
        assert!(!event.tag_entry(ids[0], "u"));
        assert_eq!(event.tags(), vec!["t"]);
        assert!(event.tagged_entries("t").is_empty());
    }

    #[test]
    fn entry_tags_sorted() {
        let (mut event, ids) = event_with(1);
        event.tag_entry(ids[0], "zeta");
        event.tag_entry(ids[0], "alpha");
        assert_eq!(event.entry_tags(ids[0]), vec!["alpha", "zeta"]);
    }

    #[test]
    fn delete_tag_drops_index_only() {
        let (mut event, ids) = event_with(1);
        event.tag_entry(ids[0], "t");
        assert!(event.delete_tag("t"));
        assert!(!event.delete_tag("t"));
        assert!(event.tags().is_empty());
        assert_eq!(event.all_entries(), ids);
    }
}
