//! In-memory play queue with wrap-around navigation

use std::path::{Path, PathBuf};

/// Ordered list of track paths with a current selection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Playlist {
    tracks: Vec<PathBuf>,
    current: Option<usize>,
}

impl Playlist {
    /// Create a playlist; the first track (if any) is selected
    pub fn new(tracks: Vec<PathBuf>) -> Self {
        let current = (!tracks.is_empty()).then_some(0);
        Self { tracks, current }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    /// Currently selected track
    pub fn current(&self) -> Option<&Path> {
        self.current.map(|i| self.tracks[i].as_path())
    }

    /// Append a track without changing the selection (unless nothing was
    /// selected yet). Returns its index.
    pub fn push(&mut self, path: PathBuf) -> usize {
        self.tracks.push(path);
        let index = self.tracks.len() - 1;
        if self.current.is_none() {
            self.current = Some(index);
        }
        index
    }

    /// Select `path`, appending it first if it isn't queued yet
    pub fn add_and_select(&mut self, path: PathBuf) -> &Path {
        let index = match self.tracks.iter().position(|p| *p == path) {
            Some(index) => index,
            None => {
                self.tracks.push(path);
                self.tracks.len() - 1
            }
        };
        self.current = Some(index);
        self.tracks[index].as_path()
    }

    /// Select the track at `index`
    pub fn select(&mut self, index: usize) -> Option<&Path> {
        if index >= self.tracks.len() {
            return None;
        }
        self.current = Some(index);
        self.current()
    }

    /// Advance to the following track, wrapping to the first
    pub fn next_track(&mut self) -> Option<&Path> {
        let len = self.tracks.len();
        let index = self.current.map_or(0, |i| (i + 1) % len.max(1));
        self.select(index)
    }

    /// Go back to the preceding track, wrapping to the last
    pub fn previous_track(&mut self) -> Option<&Path> {
        let len = self.tracks.len();
        if len == 0 {
            return None;
        }
        let index = self.current.map_or(len - 1, |i| (i + len - 1) % len);
        self.select(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playlist(names: &[&str]) -> Playlist {
        Playlist::new(names.iter().map(PathBuf::from).collect())
    }

    #[test]
    fn test_new_selects_first_track() {
        let list = playlist(&["a.wav", "b.wav"]);
        assert_eq!(list.current(), Some(Path::new("a.wav")));
        assert_eq!(Playlist::new(Vec::new()).current(), None);
    }

    #[test]
    fn test_next_and_previous_wrap() {
        let mut list = playlist(&["a.wav", "b.wav", "c.wav"]);
        assert_eq!(list.next_track(), Some(Path::new("b.wav")));
        assert_eq!(list.next_track(), Some(Path::new("c.wav")));
        assert_eq!(list.next_track(), Some(Path::new("a.wav")));
        assert_eq!(list.previous_track(), Some(Path::new("c.wav")));
        assert_eq!(list.previous_track(), Some(Path::new("b.wav")));
    }

    #[test]
    fn test_empty_playlist_navigation() {
        let mut list = Playlist::default();
        assert_eq!(list.next_track(), None);
        assert_eq!(list.previous_track(), None);
        assert_eq!(list.current_index(), None);
    }

    #[test]
    fn test_push_keeps_selection() {
        let mut list = Playlist::default();
        assert_eq!(list.push(PathBuf::from("a.wav")), 0);
        assert_eq!(list.push(PathBuf::from("b.wav")), 1);
        assert_eq!(list.current_index(), Some(0));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_add_and_select_reuses_queued_path() {
        let mut list = playlist(&["a.wav", "b.wav"]);
        assert_eq!(list.add_and_select(PathBuf::from("b.wav")), Path::new("b.wav"));
        assert_eq!(list.len(), 2);
        assert_eq!(list.current_index(), Some(1));

        list.add_and_select(PathBuf::from("c.wav"));
        assert_eq!(list.len(), 3);
        assert_eq!(list.current_index(), Some(2));
    }

    #[test]
    fn test_select_out_of_range() {
        let mut list = playlist(&["a.wav"]);
        assert_eq!(list.select(3), None);
        assert_eq!(list.current_index(), Some(0));
    }
}
