use std::mem;
use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;
use tracing::{debug, error, info, warn};

use crate::api::SheetSource;
use crate::config::Config;
use crate::download::ImageDownloader;
use crate::fetch::{CancelToken, FetchOutcome, FetchPayload, Fetcher, LoadState, MountCounter};
use crate::models::SheetDetail;

use super::dialogs::{AlertDialog, StatusKind, StatusMessage};
use super::helpers::{
    attribute_line, centered_rect, describe_fetch_error, image_preview_lines, page_indicator,
};
use super::screens::{DetailScreen, ListingScreen, Route};

/// Rows reserved for the brand/nav header.
const HEADER_HEIGHT: u16 = 3;
/// Footer space reserved for status, instructions, links, and the copyright line.
const FOOTER_HEIGHT: u16 = 5;
/// Width of the image preview panel on the detail screen.
const IMAGE_PANEL_WIDTH: u16 = 24;
/// Header navigation labels. They are decorative, like the login entry.
const NAV_ITEMS: &[&str] = &["SoloGuitar", "Tutoriales", "Academias afiliadas", "Canciones"];
/// Footer links. Decorative as well.
const FOOTER_LINKS: &[&str] = &[
    "Términos y condiciones",
    "Política de seguridad",
    "Política de privacidad",
];
const COPYRIGHT: &str = "Copyright SoloGuitar 2024 - 2024 © Todos los derechos reservados";
const LOGIN_UNAVAILABLE: &str = "El inicio de sesión todavía no está disponible.";

/// Fine-grained modes layered over whichever screen is on top.
enum Mode {
    Normal,
    Alert(AlertDialog),
}

/// Central application state: the navigation stack plus everything it needs
/// to fetch and save data. The bottom of the stack is always the listing.
pub struct App {
    config: Config,
    fetcher: Fetcher,
    mounts: MountCounter,
    stack: Vec<Route>,
    mode: Mode,
    status: Option<StatusMessage>,
    downloader: ImageDownloader,
}

impl App {
    /// Build the app and mount the listing screen, which starts its fetch
    /// right away.
    pub fn new(config: Config, source: Arc<dyn SheetSource>, downloader: ImageDownloader) -> Self {
        let mut app = Self {
            config,
            fetcher: Fetcher::new(source),
            mounts: MountCounter::default(),
            stack: Vec::new(),
            mode: Mode::Normal,
            status: None,
            downloader,
        };
        let listing = app.mount_listing();
        app.stack.push(Route::Listing(listing));
        app
    }

    /// Entry point for raw terminal key events. Ctrl+C quits from anywhere;
    /// every other Ctrl chord is ignored so it never doubles as a plain key.
    pub fn handle_key_event(&mut self, key: KeyEvent) -> bool {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return matches!(key.code, KeyCode::Char('c'));
        }
        self.handle_key(key.code)
    }

    /// Top-level key dispatcher. Every key goes through the active `Mode`,
    /// which returns the next mode to run. The result tells the outer loop
    /// whether the user asked to quit.
    pub fn handle_key(&mut self, code: KeyCode) -> bool {
        let mut exit = false;
        let mode = mem::replace(&mut self.mode, Mode::Normal);

        self.mode = match mode {
            Mode::Normal => self.handle_normal_key(code, &mut exit),
            Mode::Alert(alert) => self.handle_alert_key(code, alert),
        };

        exit
    }

    /// Apply every fetch result that has arrived. Returns how many results
    /// changed screen state.
    pub fn poll_updates(&mut self) -> usize {
        let outcomes = self.fetcher.drain();
        outcomes
            .into_iter()
            .map(|outcome| self.apply_outcome(outcome))
            .filter(|applied| *applied)
            .count()
    }

    /// Depth of the navigation stack, listing included.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    fn handle_normal_key(&mut self, code: KeyCode, exit: &mut bool) -> Mode {
        match self.stack.last_mut() {
            Some(Route::Listing(listing)) => match code {
                KeyCode::Char('q') | KeyCode::Esc => {
                    *exit = true;
                }
                KeyCode::Up => listing.move_selection(-1),
                KeyCode::Down => listing.move_selection(1),
                KeyCode::Left | KeyCode::PageUp | KeyCode::Char('p') => {
                    listing.previous_page();
                }
                KeyCode::Right | KeyCode::PageDown | KeyCode::Char('n') => {
                    listing.next_page();
                }
                KeyCode::Enter => {
                    if let Some(id) = listing.current_sheet().map(|sheet| sheet.id) {
                        self.push_detail(id);
                    } else {
                        self.set_status(
                            "No hay ninguna partitura seleccionada.",
                            StatusKind::Error,
                        );
                    }
                }
                KeyCode::Char('r') => self.reload_current(),
                KeyCode::Char('l') => self.set_status(LOGIN_UNAVAILABLE, StatusKind::Info),
                _ => {}
            },
            Some(Route::Detail(detail)) => match code {
                KeyCode::Char('q') => {
                    *exit = true;
                }
                KeyCode::Esc | KeyCode::Backspace => self.pop_detail(),
                KeyCode::Up => detail.move_selection(-1),
                KeyCode::Down => detail.move_selection(1),
                KeyCode::Enter => {
                    if detail.detail.loaded().is_none() {
                        return Mode::Normal;
                    }
                    if let Some(id) = detail.current_recommendation().map(|rec| rec.id) {
                        self.push_detail(id);
                    }
                }
                KeyCode::Char('d') => {
                    if detail.detail.loaded().is_some() {
                        return self.download_image();
                    }
                    self.set_status("Espera a que cargue la partitura.", StatusKind::Error);
                }
                KeyCode::Char('r') => self.reload_current(),
                KeyCode::Char('l') => self.set_status(LOGIN_UNAVAILABLE, StatusKind::Info),
                _ => {}
            },
            None => {
                *exit = true;
            }
        }
        Mode::Normal
    }

    fn handle_alert_key(&mut self, code: KeyCode, alert: AlertDialog) -> Mode {
        match code {
            KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ') => Mode::Normal,
            _ => Mode::Alert(alert),
        }
    }

    /// Route a finished request to the screen that issued it. Results from a
    /// cancelled token or a mount that is no longer on the stack are dropped.
    fn apply_outcome(&mut self, outcome: FetchOutcome) -> bool {
        let stale = outcome.is_stale();
        let FetchOutcome { mount, payload, .. } = outcome;
        if stale {
            debug!(mount = mount.get(), "discarding result for an invalidated screen");
            return false;
        }

        let Some(route) = self.stack.iter_mut().find(|route| route.mount() == mount) else {
            debug!(mount = mount.get(), "discarding result for an unmounted screen");
            return false;
        };

        match (route, payload) {
            (Route::Listing(listing), FetchPayload::Sheets(result)) => {
                match &result {
                    Ok(sheets) => info!(count = sheets.len(), "sheet listing loaded"),
                    Err(err) => error!(error = %err, "failed to load sheet listing"),
                }
                listing.apply_sheets(result);
            }
            (Route::Detail(detail), FetchPayload::Detail(result)) => {
                if let Err(err) = &result {
                    error!(sheet_id = detail.sheet_id, error = %err, "failed to load sheet detail");
                }
                detail.apply_detail(result);
            }
            (Route::Detail(detail), FetchPayload::Recommendations(result)) => {
                if let Err(err) = &result {
                    error!(sheet_id = detail.sheet_id, error = %err, "failed to load recommendations");
                }
                detail.apply_recommendations(result);
            }
            (_, payload) => {
                warn!(mount = mount.get(), ?payload, "result does not belong to this screen");
                return false;
            }
        }
        true
    }

    fn mount_listing(&mut self) -> ListingScreen {
        let mount = self.mounts.next_id();
        let token = CancelToken::new();
        info!(mount = mount.get(), "mounting sheet listing");
        self.fetcher.spawn(mount, token.clone(), |source| {
            FetchPayload::Sheets(source.list_sheets())
        });
        ListingScreen::new(mount, token)
    }

    fn mount_detail(&mut self, sheet_id: i64) -> DetailScreen {
        let mount = self.mounts.next_id();
        let token = CancelToken::new();
        let count = self.config.recommendation_count;
        info!(mount = mount.get(), sheet_id, "mounting sheet detail");
        self.fetcher.spawn(mount, token.clone(), move |source| {
            FetchPayload::Detail(source.fetch_sheet(sheet_id))
        });
        self.fetcher.spawn(mount, token.clone(), move |source| {
            FetchPayload::Recommendations(source.recommend(sheet_id, count))
        });
        DetailScreen::new(mount, token, sheet_id)
    }

    fn push_detail(&mut self, sheet_id: i64) {
        self.clear_status();
        let detail = self.mount_detail(sheet_id);
        self.stack.push(Route::Detail(detail));
    }

    /// Leave the top detail screen. Its pending requests are invalidated.
    fn pop_detail(&mut self) {
        if self.stack.len() <= 1 {
            return;
        }
        if let Some(route) = self.stack.pop() {
            route.token().cancel();
            debug!(mount = route.mount().get(), "left detail screen");
        }
        self.clear_status();
    }

    /// Remount the top screen with a fresh token so earlier responses are
    /// ignored.
    fn reload_current(&mut self) {
        let Some(route) = self.stack.pop() else {
            return;
        };
        route.token().cancel();
        let fresh = match route {
            Route::Listing(_) => Route::Listing(self.mount_listing()),
            Route::Detail(detail) => Route::Detail(self.mount_detail(detail.sheet_id)),
        };
        self.stack.push(fresh);
        self.set_status("Recargando...", StatusKind::Info);
    }

    fn download_image(&mut self) -> Mode {
        match self.downloader.save_placeholder() {
            Ok(saved) => {
                self.set_status("Imagen descargada.", StatusKind::Info);
                Mode::Alert(AlertDialog::info("Imagen descargada", saved.confirmation()))
            }
            Err(err) => {
                error!(error = %err, "failed to save sheet image");
                self.set_status("No se pudo descargar la imagen.", StatusKind::Error);
                Mode::Alert(AlertDialog::error(
                    "Descarga fallida",
                    "Hubo un error al descargar la imagen.",
                ))
            }
        }
    }

    pub(crate) fn draw(&self, frame: &mut Frame) {
        let area = frame.area();
        let header_height = HEADER_HEIGHT.min(area.height);
        let footer_height = FOOTER_HEIGHT.min(area.height.saturating_sub(header_height));

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(header_height),
                Constraint::Min(0),
                Constraint::Length(footer_height),
            ])
            .split(area);

        self.draw_header(frame, chunks[0]);
        match self.stack.last() {
            Some(Route::Listing(listing)) => self.draw_listing(frame, chunks[1], listing),
            Some(Route::Detail(detail)) => self.draw_detail(frame, chunks[1], detail),
            None => {}
        }
        self.draw_footer(frame, chunks[2]);

        if let Mode::Alert(alert) = &self.mode {
            self.draw_alert(frame, area, alert);
        }
    }

    fn draw_header(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::BOTTOM);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(0), Constraint::Length(22)])
            .split(inner);

        let mut nav = Vec::new();
        for (idx, item) in NAV_ITEMS.iter().enumerate() {
            if idx > 0 {
                nav.push(Span::raw("   "));
            }
            let style = if idx == 0 {
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            nav.push(Span::styled(*item, style));
        }
        frame.render_widget(Paragraph::new(Line::from(nav)), chunks[0]);

        let login = Paragraph::new(Line::from(vec![
            Span::styled("[l] ", Style::default().fg(Color::Cyan)),
            Span::styled(
                "Iniciar Sesión",
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::LightRed)
                    .add_modifier(Modifier::BOLD),
            ),
        ]))
        .alignment(Alignment::Right);
        frame.render_widget(login, chunks[1]);
    }

    fn draw_listing(&self, frame: &mut Frame, area: Rect, listing: &ListingScreen) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(3), Constraint::Length(3)])
            .split(area);

        let block = Block::default()
            .borders(Borders::ALL)
            .title(Span::styled(
                "Partituras",
                Style::default().add_modifier(Modifier::BOLD),
            ));

        match &listing.sheets {
            LoadState::Loading => {
                let message = Paragraph::new("Cargando partituras...")
                    .alignment(Alignment::Center)
                    .block(block);
                frame.render_widget(message, chunks[0]);
            }
            LoadState::Failed(err) => {
                let message = Paragraph::new(vec![
                    Line::from(describe_fetch_error(err)),
                    Line::from(Span::styled(
                        "Pulsa r para intentarlo de nuevo.",
                        Style::default().fg(Color::Gray),
                    )),
                ])
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true })
                .block(block);
                frame.render_widget(message, chunks[0]);
            }
            LoadState::Loaded(sheets) if sheets.is_empty() => {
                let message = Paragraph::new("No hay partituras disponibles.")
                    .alignment(Alignment::Center)
                    .block(block);
                frame.render_widget(message, chunks[0]);
            }
            LoadState::Loaded(_) => {
                let items: Vec<ListItem> = listing
                    .visible()
                    .iter()
                    .map(|sheet| ListItem::new(sheet.to_string()))
                    .collect();
                let list = List::new(items)
                    .block(block)
                    .highlight_style(
                        Style::default()
                            .fg(Color::Yellow)
                            .add_modifier(Modifier::BOLD),
                    )
                    .highlight_symbol("▶ ");
                let mut state = ListState::default();
                state.select(Some(listing.selected));
                frame.render_stateful_widget(list, chunks[0], &mut state);
            }
        }

        let key_style = Style::default().fg(Color::Cyan);
        let pagination = Paragraph::new(Line::from(vec![
            Span::styled("[←]", key_style),
            Span::raw(" Anterior   "),
            Span::styled(
                page_indicator(listing.pagination.current_page(), listing.total_pages()),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw("   Siguiente "),
            Span::styled("[→]", key_style),
        ]))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
        frame.render_widget(pagination, chunks[1]);
    }

    fn draw_detail(&self, frame: &mut Frame, area: Rect, detail: &DetailScreen) {
        let sheet = match &detail.detail {
            LoadState::Loading => {
                let message = Paragraph::new("Cargando...").alignment(Alignment::Center);
                frame.render_widget(message, area);
                return;
            }
            LoadState::Failed(err) => {
                let message = Paragraph::new(vec![
                    Line::from(describe_fetch_error(err)),
                    Line::from(Span::styled(
                        "Pulsa Esc para volver o r para reintentar.",
                        Style::default().fg(Color::Gray),
                    )),
                ])
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true });
                frame.render_widget(message, area);
                return;
            }
            LoadState::Loaded(sheet) => sheet,
        };

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2),
                Constraint::Length(8),
                Constraint::Min(3),
            ])
            .split(area);

        let title = Paragraph::new(Line::from(vec![
            Span::styled(
                sheet.name.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!("  #{}", sheet.id),
                Style::default().fg(Color::DarkGray),
            ),
        ]));
        frame.render_widget(title, chunks[0]);

        self.draw_sheet_attributes(frame, chunks[1], sheet);
        self.draw_recommendations(frame, chunks[2], detail);
    }

    fn draw_sheet_attributes(&self, frame: &mut Frame, area: Rect, sheet: &SheetDetail) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(20), Constraint::Length(IMAGE_PANEL_WIDTH)])
            .split(area);

        let attributes = Paragraph::new(vec![
            attribute_line("Autor", &sheet.author),
            attribute_line("Género", &sheet.genre),
            attribute_line("Tempo", &sheet.tempo),
            attribute_line("Claves", &sheet.keys),
            attribute_line("Notas", &sheet.notes),
        ])
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("Detalles"));
        frame.render_widget(attributes, columns[0]);

        let image_block = Block::default().borders(Borders::ALL).title("Partitura");
        let inner = image_block.inner(columns[1]);
        let preview = Paragraph::new(image_preview_lines(inner.width, inner.height))
            .block(image_block);
        frame.render_widget(preview, columns[1]);
    }

    fn draw_recommendations(&self, frame: &mut Frame, area: Rect, detail: &DetailScreen) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title("Te podría interesar...");

        match &detail.recommendations {
            LoadState::Loading => {
                let message = Paragraph::new(Span::styled(
                    "Cargando recomendaciones...",
                    Style::default().fg(Color::Gray),
                ))
                .block(block);
                frame.render_widget(message, area);
            }
            LoadState::Failed(_) => {
                let message = Paragraph::new(Span::styled(
                    "Las recomendaciones no están disponibles ahora.",
                    Style::default().fg(Color::DarkGray),
                ))
                .block(block);
                frame.render_widget(message, area);
            }
            LoadState::Loaded(recommendations) => {
                let items: Vec<ListItem> = recommendations
                    .iter()
                    .map(|rec| {
                        ListItem::new(vec![
                            Line::from(Span::styled(
                                rec.display_title(),
                                Style::default().add_modifier(Modifier::BOLD),
                            )),
                            Line::from(Span::styled(
                                format!("Género: {}", rec.genre),
                                Style::default().fg(Color::Gray),
                            )),
                        ])
                    })
                    .collect();
                let list = List::new(items)
                    .block(block)
                    .highlight_style(Style::default().fg(Color::Yellow))
                    .highlight_symbol("▶ ");
                let mut state = ListState::default();
                if !recommendations.is_empty() {
                    state.select(Some(detail.selected));
                }
                frame.render_stateful_widget(list, area, &mut state);
            }
        }
    }

    fn draw_footer(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::TOP);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let status_line = if let Some(status) = &self.status {
            Line::from(vec![Span::styled(status.text.clone(), status.kind.style())])
        } else {
            Line::from("")
        };

        let link_style = Style::default().fg(Color::Gray);
        let mut links = Vec::new();
        for (idx, link) in FOOTER_LINKS.iter().enumerate() {
            if idx > 0 {
                links.push(Span::raw("  |  "));
            }
            links.push(Span::styled(*link, link_style));
        }

        let paragraph = Paragraph::new(vec![
            status_line,
            self.footer_instructions(),
            Line::from(links),
            Line::from(Span::styled(COPYRIGHT, Style::default().fg(Color::DarkGray))),
        ]);
        frame.render_widget(paragraph, inner);
    }

    fn footer_instructions(&self) -> Line<'static> {
        let key_style = Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD);
        match (&self.mode, self.stack.last()) {
            (Mode::Alert(_), _) => Line::from(vec![
                Span::styled("[Enter]", key_style),
                Span::raw(" Cerrar"),
            ]),
            (_, Some(Route::Detail(_))) => Line::from(vec![
                Span::styled("[↑↓]", key_style),
                Span::raw(" Elegir   "),
                Span::styled("[Enter]", key_style),
                Span::raw(" Abrir   "),
                Span::styled("[d]", key_style),
                Span::raw(" Descargar   "),
                Span::styled("[r]", key_style),
                Span::raw(" Recargar   "),
                Span::styled("[Esc]", key_style),
                Span::raw(" Volver   "),
                Span::styled("[q]", key_style),
                Span::raw(" Salir"),
            ]),
            _ => Line::from(vec![
                Span::styled("[↑↓]", key_style),
                Span::raw(" Elegir   "),
                Span::styled("[←→]", key_style),
                Span::raw(" Página   "),
                Span::styled("[Enter]", key_style),
                Span::raw(" Abrir   "),
                Span::styled("[r]", key_style),
                Span::raw(" Recargar   "),
                Span::styled("[q]", key_style),
                Span::raw(" Salir"),
            ]),
        }
    }

    fn draw_alert(&self, frame: &mut Frame, area: Rect, alert: &AlertDialog) {
        let popup_area = centered_rect(60, 30, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title(alert.title)
            .borders(Borders::ALL)
            .border_style(alert.kind.style());
        let inner = block.inner(popup_area);
        frame.render_widget(block, popup_area);

        let lines = vec![
            Line::from(alert.message.clone()),
            Line::from(""),
            Line::from(Span::styled(
                "Pulsa Enter para cerrar.",
                Style::default().fg(Color::Gray),
            )),
        ];
        let paragraph = Paragraph::new(lines)
            .alignment(Alignment::Left)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn set_status<S: Into<String>>(&mut self, text: S, kind: StatusKind) {
        self.status = Some(StatusMessage {
            text: text.into(),
            kind,
        });
    }

    fn clear_status(&mut self) {
        self.status = None;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    use super::*;
    use crate::api::FetchError;
    use crate::download::ResolvedTarget;
    use crate::fetch::{Fetcher, MountId};
    use crate::models::{Recommendation, SheetSummary};

    #[derive(Default)]
    struct FakeSource {
        sheets: Vec<SheetSummary>,
        details: HashMap<i64, SheetDetail>,
        recommendations: HashMap<i64, Vec<Recommendation>>,
        recommend_calls: Mutex<Vec<(i64, usize)>>,
    }

    impl SheetSource for FakeSource {
        fn list_sheets(&self) -> Result<Vec<SheetSummary>, FetchError> {
            Ok(self.sheets.clone())
        }

        fn fetch_sheet(&self, id: i64) -> Result<SheetDetail, FetchError> {
            self.details.get(&id).cloned().ok_or(FetchError::NotFound(id))
        }

        fn recommend(&self, id: i64, count: usize) -> Result<Vec<Recommendation>, FetchError> {
            self.recommend_calls.lock().unwrap().push((id, count));
            let mut recs = self.recommendations.get(&id).cloned().unwrap_or_default();
            recs.truncate(count);
            Ok(recs)
        }
    }

    struct OfflineSource;

    impl SheetSource for OfflineSource {
        fn list_sheets(&self) -> Result<Vec<SheetSummary>, FetchError> {
            Err(FetchError::Network("connection refused".to_string()))
        }

        fn fetch_sheet(&self, _id: i64) -> Result<SheetDetail, FetchError> {
            Err(FetchError::Network("connection refused".to_string()))
        }

        fn recommend(&self, _id: i64, _count: usize) -> Result<Vec<Recommendation>, FetchError> {
            Err(FetchError::Network("connection refused".to_string()))
        }
    }

    fn detail(id: i64) -> SheetDetail {
        SheetDetail {
            id,
            name: format!("Sheet {id}"),
            author: format!("Author {id}"),
            genre: "Clásico".to_string(),
            tempo: "90".to_string(),
            keys: "Am".to_string(),
            notes: "A B C".to_string(),
        }
    }

    fn recommendation(id: i64) -> Recommendation {
        Recommendation {
            id,
            name: format!("Sheet {id}"),
            author: format!("Author {id}"),
            genre: "Clásico".to_string(),
        }
    }

    fn catalog() -> FakeSource {
        let sheets = (1..=12)
            .map(|id| SheetSummary {
                id,
                name: format!("Sheet {id}"),
            })
            .collect();
        let details = (1..=12).map(|id| (id, detail(id))).collect();
        let mut recommendations = HashMap::new();
        recommendations.insert(3, vec![recommendation(7), recommendation(8)]);
        recommendations.insert(7, vec![recommendation(2)]);
        FakeSource {
            sheets,
            details,
            recommendations,
            ..FakeSource::default()
        }
    }

    fn app_with(source: Arc<dyn SheetSource>, downloads: &std::path::Path) -> App {
        let downloader = ImageDownloader::with_directory(ResolvedTarget::Gallery, downloads);
        App::new(Config::default(), source, downloader)
    }

    impl App {
        /// Wait for every in-flight request and apply the results.
        fn settle(&mut self) {
            let outcomes = self.fetcher.wait_all(Duration::from_secs(5));
            for outcome in outcomes {
                self.apply_outcome(outcome);
            }
        }

        fn listing(&self) -> &ListingScreen {
            match self.stack.first() {
                Some(Route::Listing(listing)) => listing,
                _ => panic!("listing must be at the bottom of the stack"),
            }
        }

        fn top_detail(&self) -> &DetailScreen {
            match self.stack.last() {
                Some(Route::Detail(detail)) => detail,
                _ => panic!("expected a detail screen on top"),
            }
        }
    }

    fn render(app: &App) -> String {
        let backend = TestBackend::new(100, 32);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|frame| app.draw(frame)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn test_listing_loads_and_paginates() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_with(Arc::new(catalog()), dir.path());
        assert!(app.listing().sheets.is_loading());
        assert!(render(&app).contains("Cargando partituras..."));

        app.settle();
        assert_eq!(app.listing().sheet_count(), 12);
        assert_eq!(app.listing().total_pages(), 3);
        assert!(render(&app).contains("Página 1 de 3"));

        app.handle_key(KeyCode::Right);
        app.handle_key(KeyCode::Right);
        app.handle_key(KeyCode::Right);
        let ids: Vec<i64> = app.listing().visible().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![11, 12]);
        assert_eq!(app.listing().pagination.current_page(), 3);
        assert!(render(&app).contains("Página 3 de 3"));

        app.handle_key(KeyCode::Left);
        assert_eq!(app.listing().pagination.current_page(), 2);
    }

    #[test]
    fn test_failed_listing_is_distinguishable_from_loading() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_with(Arc::new(OfflineSource), dir.path());
        app.settle();
        assert!(matches!(
            app.listing().sheets,
            LoadState::Failed(FetchError::Network(_))
        ));
        assert!(app.listing().visible().is_empty());
        assert!(render(&app).contains("No se pudo conectar con el servidor."));

        app.handle_key(KeyCode::Enter);
        assert_eq!(app.depth(), 1);
    }

    #[test]
    fn test_selecting_a_sheet_pushes_detail_with_its_id() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(catalog());
        let mut app = app_with(source.clone(), dir.path());
        app.settle();

        app.handle_key(KeyCode::Down);
        app.handle_key(KeyCode::Down);
        app.handle_key(KeyCode::Enter);
        assert_eq!(app.depth(), 2);
        assert_eq!(app.top_detail().sheet_id, 3);
        assert!(render(&app).contains("Cargando..."));

        app.settle();
        assert_eq!(app.top_detail().detail.loaded(), Some(&detail(3)));
        assert_eq!(app.top_detail().recommendation_list().len(), 2);
        assert_eq!(*source.recommend_calls.lock().unwrap(), vec![(3, 5)]);

        let screen = render(&app);
        assert!(screen.contains("Autor: Author 3"));
        assert!(screen.contains("Te podría interesar..."));
        assert!(screen.contains("Sheet 7 - Author 7"));
        assert!(screen.contains("Términos y condiciones"));
    }

    #[test]
    fn test_recommendation_pushes_independent_detail() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_with(Arc::new(catalog()), dir.path());
        app.settle();
        app.handle_key(KeyCode::Down);
        app.handle_key(KeyCode::Down);
        app.handle_key(KeyCode::Enter);
        app.settle();

        let first_mount = app.top_detail().mount;
        app.handle_key(KeyCode::Enter);
        assert_eq!(app.depth(), 3);
        assert_eq!(app.top_detail().sheet_id, 7);
        assert_ne!(app.top_detail().mount, first_mount);
        assert!(app.top_detail().detail.is_loading());

        app.settle();
        assert_eq!(app.top_detail().detail.loaded(), Some(&detail(7)));
        let rec_ids: Vec<i64> = app
            .top_detail()
            .recommendation_list()
            .iter()
            .map(|rec| rec.id)
            .collect();
        assert_eq!(rec_ids, vec![2]);

        app.handle_key(KeyCode::Esc);
        assert_eq!(app.depth(), 2);
        assert_eq!(app.top_detail().sheet_id, 3);
        assert_eq!(app.top_detail().detail.loaded(), Some(&detail(3)));
        assert_eq!(app.top_detail().recommendation_list().len(), 2);
    }

    #[test]
    fn test_missing_sheet_does_not_load_or_crash() {
        let dir = tempfile::tempdir().unwrap();
        let source = FakeSource {
            sheets: vec![SheetSummary {
                id: 99,
                name: "Ghost".to_string(),
            }],
            ..FakeSource::default()
        };
        let mut app = app_with(Arc::new(source), dir.path());
        app.settle();
        app.handle_key(KeyCode::Enter);
        app.settle();

        let screen = app.top_detail();
        assert!(screen.detail.loaded().is_none());
        assert_eq!(screen.detail, LoadState::Failed(FetchError::NotFound(99)));
        assert!(render(&app).contains("No se encontró la partitura 99."));

        app.handle_key(KeyCode::Char('d'));
        assert!(matches!(app.mode, Mode::Normal));
    }

    #[test]
    fn test_empty_recommendations_render_without_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_with(Arc::new(catalog()), dir.path());
        app.settle();
        app.handle_key(KeyCode::Enter);
        app.settle();

        assert_eq!(app.top_detail().sheet_id, 1);
        assert_eq!(app.top_detail().recommendations, LoadState::Loaded(Vec::new()));
        let screen = render(&app);
        assert!(screen.contains("Te podría interesar..."));
        assert!(!screen.contains("no están disponibles"));

        app.handle_key(KeyCode::Enter);
        assert_eq!(app.depth(), 2);
    }

    #[test]
    fn test_results_for_popped_screen_are_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_with(Arc::new(catalog()), dir.path());
        app.settle();

        app.handle_key(KeyCode::Enter);
        let popped = app.top_detail().mount;
        app.handle_key(KeyCode::Esc);
        assert_eq!(app.depth(), 1);

        let outcomes = app.fetcher.wait_all(Duration::from_secs(5));
        assert_eq!(outcomes.len(), 2);
        for outcome in outcomes {
            assert_eq!(outcome.mount, popped);
            assert!(!app.apply_outcome(outcome));
        }
        assert_eq!(app.listing().sheet_count(), 12);
    }

    #[test]
    fn test_outcome_for_unknown_mount_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_with(Arc::new(catalog()), dir.path());
        app.settle();

        let mut fetcher = Fetcher::new(Arc::new(catalog()));
        let stranger = MountId::from_raw(9_999);
        fetcher.spawn(stranger, CancelToken::new(), |source| {
            FetchPayload::Sheets(source.list_sheets().map(|mut sheets| {
                sheets.truncate(1);
                sheets
            }))
        });
        for outcome in fetcher.wait_all(Duration::from_secs(5)) {
            assert!(!app.apply_outcome(outcome));
        }
        assert_eq!(app.listing().sheet_count(), 12);
    }

    #[test]
    fn test_reload_ignores_previous_listing_response() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_with(Arc::new(catalog()), dir.path());
        let original = app.listing().mount;
        app.handle_key(KeyCode::Char('r'));
        assert_ne!(app.listing().mount, original);

        let outcomes = app.fetcher.wait_all(Duration::from_secs(5));
        let applied = outcomes
            .into_iter()
            .map(|outcome| app.apply_outcome(outcome))
            .filter(|applied| *applied)
            .count();
        assert_eq!(applied, 1);
        assert_eq!(app.listing().sheet_count(), 12);
    }

    #[test]
    fn test_download_shows_confirmation_alert() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_with(Arc::new(catalog()), dir.path());
        app.settle();
        app.handle_key(KeyCode::Enter);
        app.settle();

        app.handle_key(KeyCode::Char('d'));
        match &app.mode {
            Mode::Alert(alert) => assert_eq!(alert.kind, StatusKind::Info),
            Mode::Normal => panic!("expected an alert"),
        }
        assert!(dir.path().join("partitura.png").exists());
        assert!(render(&app).contains("Imagen descargada"));

        app.handle_key(KeyCode::Char('x'));
        assert!(matches!(app.mode, Mode::Alert(_)));
        app.handle_key(KeyCode::Enter);
        assert!(matches!(app.mode, Mode::Normal));
        assert_eq!(app.depth(), 2);
    }

    #[test]
    fn test_download_failure_surfaces_error_alert() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("pictures");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let mut app = app_with(Arc::new(catalog()), &blocker);
        app.settle();
        app.handle_key(KeyCode::Enter);
        app.settle();

        app.handle_key(KeyCode::Char('d'));
        match &app.mode {
            Mode::Alert(alert) => {
                assert_eq!(alert.kind, StatusKind::Error);
                assert!(alert.message.contains("error al descargar la imagen"));
            }
            Mode::Normal => panic!("expected an alert"),
        }
    }

    #[test]
    fn test_login_is_not_functional() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_with(Arc::new(catalog()), dir.path());
        app.settle();
        app.handle_key(KeyCode::Char('l'));
        assert_eq!(app.depth(), 1);
        assert!(render(&app).contains(LOGIN_UNAVAILABLE));
    }

    #[test]
    fn test_ctrl_chords_do_not_act_as_plain_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_with(Arc::new(catalog()), dir.path());
        app.settle();
        app.handle_key(KeyCode::Enter);
        app.settle();

        let ctrl_d = KeyEvent::new(KeyCode::Char('d'), KeyModifiers::CONTROL);
        assert!(!app.handle_key_event(ctrl_d));
        assert!(matches!(app.mode, Mode::Normal));
        assert!(!dir.path().join("partitura.png").exists());

        let plain_d = KeyEvent::new(KeyCode::Char('d'), KeyModifiers::NONE);
        assert!(!app.handle_key_event(plain_d));
        assert!(matches!(app.mode, Mode::Alert(_)));

        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert!(app.handle_key_event(ctrl_c));
    }

    #[test]
    fn test_enter_ignored_when_detail_failed() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = catalog();
        source.details.remove(&3);
        let mut app = app_with(Arc::new(source), dir.path());
        app.settle();
        app.handle_key(KeyCode::Down);
        app.handle_key(KeyCode::Down);
        app.handle_key(KeyCode::Enter);
        app.settle();

        assert_eq!(app.top_detail().detail, LoadState::Failed(FetchError::NotFound(3)));
        assert_eq!(app.top_detail().recommendation_list().len(), 2);
        app.handle_key(KeyCode::Enter);
        assert_eq!(app.depth(), 2);
        assert_eq!(app.top_detail().sheet_id, 3);
    }

    #[test]
    fn test_listing_rows_and_recommendations_use_display_text() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = catalog();
        source.recommendations.insert(
            1,
            vec![Recommendation {
                id: 5,
                name: "Romanza".to_string(),
                author: String::new(),
                genre: "Romántico".to_string(),
            }],
        );
        let mut app = app_with(Arc::new(source), dir.path());
        app.settle();
        assert!(render(&app).contains("Sheet 1"));

        app.handle_key(KeyCode::Enter);
        app.settle();
        let screen = render(&app);
        assert!(screen.contains("Romanza"));
        assert!(!screen.contains("Romanza - "));
        assert!(screen.contains("Género: Romántico"));
    }

    #[test]
    fn test_quit_from_listing_and_back_from_detail() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_with(Arc::new(catalog()), dir.path());
        app.settle();
        app.handle_key(KeyCode::Enter);
        assert!(!app.handle_key(KeyCode::Esc));
        assert_eq!(app.depth(), 1);
        assert!(app.handle_key(KeyCode::Esc));
    }
}
