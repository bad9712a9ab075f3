use crate::api::FetchError;
use crate::fetch::{CancelToken, LoadState, MountId};
use crate::models::{Recommendation, SheetDetail, SheetSummary};
use crate::pagination::{total_pages, PaginationState};

/// Backing state for the paginated sheet listing.
pub(crate) struct ListingScreen {
    pub(crate) mount: MountId,
    pub(crate) token: CancelToken,
    pub(crate) sheets: LoadState<Vec<SheetSummary>>,
    pub(crate) pagination: PaginationState,
    /// Row within the visible page, not an index into `sheets`.
    pub(crate) selected: usize,
}

impl ListingScreen {
    pub(crate) fn new(mount: MountId, token: CancelToken) -> Self {
        Self {
            mount,
            token,
            sheets: LoadState::Loading,
            pagination: PaginationState::default(),
            selected: 0,
        }
    }

    pub(crate) fn apply_sheets(&mut self, result: Result<Vec<SheetSummary>, FetchError>) {
        self.sheets = LoadState::from_result(result);
        self.pagination.clamp(self.sheet_count());
        self.ensure_in_bounds();
    }

    fn all_sheets(&self) -> &[SheetSummary] {
        self.sheets.loaded().map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn sheet_count(&self) -> usize {
        self.all_sheets().len()
    }

    pub(crate) fn visible(&self) -> &[SheetSummary] {
        self.pagination.visible_slice(self.all_sheets())
    }

    pub(crate) fn total_pages(&self) -> usize {
        total_pages(self.sheet_count())
    }

    pub(crate) fn current_sheet(&self) -> Option<&SheetSummary> {
        self.visible().get(self.selected)
    }

    pub(crate) fn move_selection(&mut self, offset: isize) {
        let len = self.visible().len();
        if len == 0 {
            return;
        }
        let new = (self.selected as isize + offset).clamp(0, len as isize - 1);
        self.selected = new as usize;
    }

    pub(crate) fn next_page(&mut self) -> bool {
        let changed = self.pagination.next_page(self.sheet_count());
        if changed {
            self.selected = 0;
        }
        changed
    }

    pub(crate) fn previous_page(&mut self) -> bool {
        let changed = self.pagination.previous_page(self.sheet_count());
        if changed {
            self.selected = 0;
        }
        changed
    }

    fn ensure_in_bounds(&mut self) {
        let len = self.visible().len();
        if len == 0 {
            self.selected = 0;
        } else if self.selected >= len {
            self.selected = len - 1;
        }
    }
}

/// Backing state for one pushed detail screen.
pub(crate) struct DetailScreen {
    pub(crate) mount: MountId,
    pub(crate) token: CancelToken,
    pub(crate) sheet_id: i64,
    pub(crate) detail: LoadState<SheetDetail>,
    pub(crate) recommendations: LoadState<Vec<Recommendation>>,
    pub(crate) selected: usize,
}

impl DetailScreen {
    pub(crate) fn new(mount: MountId, token: CancelToken, sheet_id: i64) -> Self {
        Self {
            mount,
            token,
            sheet_id,
            detail: LoadState::Loading,
            recommendations: LoadState::Loading,
            selected: 0,
        }
    }

    pub(crate) fn apply_detail(&mut self, result: Result<SheetDetail, FetchError>) {
        self.detail = LoadState::from_result(result);
    }

    pub(crate) fn apply_recommendations(&mut self, result: Result<Vec<Recommendation>, FetchError>) {
        self.recommendations = LoadState::from_result(result);
        self.selected = 0;
    }

    /// Recommendations to render. Loading and failed states show no entries.
    pub(crate) fn recommendation_list(&self) -> &[Recommendation] {
        self.recommendations
            .loaded()
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub(crate) fn current_recommendation(&self) -> Option<&Recommendation> {
        self.recommendation_list().get(self.selected)
    }

    pub(crate) fn move_selection(&mut self, offset: isize) {
        let len = self.recommendation_list().len();
        if len == 0 {
            return;
        }
        let new = (self.selected as isize + offset).clamp(0, len as isize - 1);
        self.selected = new as usize;
    }
}

/// One entry on the navigation stack.
pub(crate) enum Route {
    Listing(ListingScreen),
    Detail(DetailScreen),
}

impl Route {
    pub(crate) fn mount(&self) -> MountId {
        match self {
            Route::Listing(screen) => screen.mount,
            Route::Detail(screen) => screen.mount,
        }
    }

    pub(crate) fn token(&self) -> &CancelToken {
        match self {
            Route::Listing(screen) => &screen.token,
            Route::Detail(screen) => &screen.token,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::MountCounter;

    fn sheets(count: i64) -> Vec<SheetSummary> {
        (1..=count)
            .map(|id| SheetSummary {
                id,
                name: format!("Sheet {id}"),
            })
            .collect()
    }

    fn listing() -> ListingScreen {
        ListingScreen::new(MountCounter::default().next_id(), CancelToken::new())
    }

    #[test]
    fn test_listing_pages_through_twelve_sheets() {
        let mut screen = listing();
        screen.apply_sheets(Ok(sheets(12)));
        assert_eq!(screen.total_pages(), 3);
        assert!(screen.next_page());
        assert!(screen.next_page());
        assert!(!screen.next_page());
        let ids: Vec<i64> = screen.visible().iter().map(|sheet| sheet.id).collect();
        assert_eq!(ids, vec![11, 12]);
    }

    #[test]
    fn test_page_change_resets_selection() {
        let mut screen = listing();
        screen.apply_sheets(Ok(sheets(12)));
        screen.move_selection(3);
        assert_eq!(screen.current_sheet().map(|s| s.id), Some(4));
        screen.next_page();
        assert_eq!(screen.current_sheet().map(|s| s.id), Some(6));
    }

    #[test]
    fn test_selection_stays_inside_the_visible_page() {
        let mut screen = listing();
        screen.apply_sheets(Ok(sheets(7)));
        screen.next_page();
        screen.move_selection(10);
        assert_eq!(screen.current_sheet().map(|s| s.id), Some(7));
        screen.move_selection(-10);
        assert_eq!(screen.current_sheet().map(|s| s.id), Some(6));
    }

    #[test]
    fn test_failed_listing_has_no_rows() {
        let mut screen = listing();
        screen.apply_sheets(Err(FetchError::Network("refused".to_string())));
        assert!(matches!(screen.sheets, LoadState::Failed(_)));
        assert!(screen.visible().is_empty());
        assert!(screen.current_sheet().is_none());
        assert!(!screen.next_page());
        assert_eq!(screen.pagination.current_page(), 1);
    }

    #[test]
    fn test_empty_recommendations_render_zero_entries() {
        let mut screen = DetailScreen::new(MountCounter::default().next_id(), CancelToken::new(), 3);
        screen.apply_recommendations(Ok(Vec::new()));
        assert!(screen.recommendation_list().is_empty());
        assert!(screen.current_recommendation().is_none());
        screen.move_selection(1);
        assert_eq!(screen.selected, 0);
    }
}
