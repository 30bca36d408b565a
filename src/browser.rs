use std::collections::BTreeSet;
use std::ops::Bound;
use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};
use std::thread;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    text::{Line, Span},
    widgets::{Cell, Paragraph, Row, Table, TableState},
    DefaultTerminal, Frame,
};

use crate::api::{ApiClient, Resource};
use crate::error::{CarteiraError, Result};
use crate::export::export_to_csv;
use crate::filters::{DateRange, FilterState};
use crate::fmt::parse_calendar_date;
use crate::form::{EntityForm, FormAction};
use crate::models::TransactionType;
use crate::query::{spawn_list, Accepted, ListQuery, ListResponse, QueryKey};
use crate::settings::Settings;
use crate::table::{DataTable, TableBody, LOADING_MESSAGE};
use crate::tui::{
    self, ERROR_STYLE, FOOTER_STYLE, HEADER_STYLE, SELECTED_STYLE, SUCCESS_STYLE,
};
use crate::views::{blank_form, EntityView, EXPORTED, LOAD_FAILED};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const SESSION_EXPIRED: &str = "Sessão expirada. Execute `carteira login`.";
const ACTIONS_WIDTH: u16 = 8;

/// What a worker thread reports back to the browser.
pub enum BrowserEvent<T> {
    Fetched(ListResponse<T>),
    Mutated {
        result: Result<()>,
        success: &'static str,
        failure: &'static str,
        from_form: bool,
    },
}

impl<T> From<ListResponse<T>> for BrowserEvent<T> {
    fn from(response: ListResponse<T>) -> Self {
        BrowserEvent::Fetched(response)
    }
}

type Job = Box<dyn FnOnce(&ApiClient) -> Result<()> + Send>;

/// A remote write waiting to be run off the UI thread.
pub struct Mutation {
    job: Job,
    success: &'static str,
    failure: &'static str,
    from_form: bool,
}

enum BrowseMode {
    Normal,
    Search(String),
    ClientId(String),
    AssetId(String),
    DateRange(String),
    GotoPage(String),
    ConfirmDelete { id: i64, summary: String },
    Form(EntityForm),
}

#[derive(Debug, PartialEq, Eq)]
pub enum BrowseAction {
    Continue,
    Close,
    Export,
    Save,
    Delete(i64),
    Toggle(i64),
}

struct Toast {
    text: String,
    error: bool,
}

/// Interactive list view for one entity. Owns its filter state for as long
/// as it is open and re-fetches whenever the filters or the page change.
pub struct ListBrowser<T: EntityView> {
    table: DataTable<T>,
    filters: FilterState,
    query: ListQuery<T>,
    page: u32,
    page_size: u32,
    selected: usize,
    mode: BrowseMode,
    toast: Option<Toast>,
    export_dir: PathBuf,
    exchanges: BTreeSet<String>,
    currencies: BTreeSet<String>,
    table_state: TableState,
}

/// Parse `AAAA-MM-DD..AAAA-MM-DD`. Either side may be left out, a single date
/// selects that one day and empty input clears the range.
pub fn parse_date_range(input: &str) -> std::result::Result<Option<DateRange>, String> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }
    let (from, to) = input.split_once("..").unwrap_or((input, input));

    let side = |raw: &str| -> std::result::Result<_, String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        parse_calendar_date(raw)
            .map(Some)
            .ok_or_else(|| format!("Data inválida: {raw}"))
    };
    let (from, to) = (side(from)?, side(to)?);

    if let (Some(f), Some(t)) = (from, to) {
        if f > t {
            return Err("A data inicial deve ser anterior à data final".to_string());
        }
    }
    let range = DateRange::from_dates(from, to);
    Ok((!range.is_empty()).then_some(range))
}

fn next_option(current: Option<&str>, options: &BTreeSet<String>) -> Option<String> {
    match current {
        None => options.iter().next().cloned(),
        Some(cur) => options
            .range::<str, _>((Bound::Excluded(cur), Bound::Unbounded))
            .next()
            .cloned(),
    }
}

fn parse_id(input: &str) -> std::result::Result<Option<i64>, String> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }
    match input.parse::<i64>() {
        Ok(id) if id >= 1 => Ok(Some(id)),
        _ => Err(format!("ID inválido: {input}")),
    }
}

impl<T: EntityView> ListBrowser<T> {
    pub fn new(settings: &Settings) -> Self {
        Self {
            table: T::table(&settings.currency),
            filters: FilterState::new(),
            query: ListQuery::new(),
            page: 1,
            page_size: settings.page_size.max(1),
            selected: 0,
            mode: BrowseMode::Normal,
            toast: None,
            export_dir: settings.export_path(),
            exchanges: BTreeSet::new(),
            currencies: BTreeSet::new(),
            table_state: TableState::default(),
        }
    }

    /// Start with these filters instead of the defaults.
    pub fn with_filters(mut self, filters: FilterState) -> Self {
        self.filters = filters;
        self
    }

    fn current_key(&self) -> QueryKey {
        QueryKey::new(
            T::PATH,
            self.filters.api_params().with_page(self.page, self.page_size),
        )
    }

    fn total_pages(&self) -> u32 {
        self.query.page().pages.max(1)
    }

    /// The key and generation of the fetch to start, if the rows on screen
    /// are out of date.
    pub fn next_fetch(&mut self) -> Option<(QueryKey, u64)> {
        let key = self.current_key();
        if !self.query.needs_fetch() && self.query.key() == Some(&key) {
            return None;
        }
        let generation = self.query.request(key.clone());
        Some((key, generation))
    }

    fn notify(&mut self, text: impl Into<String>) {
        self.toast = Some(Toast {
            text: text.into(),
            error: false,
        });
    }

    fn fail(&mut self, text: impl Into<String>) {
        self.toast = Some(Toast {
            text: text.into(),
            error: true,
        });
    }

    fn filters_changed(&mut self) {
        self.page = 1;
        self.selected = 0;
        self.query.invalidate();
    }

    fn go_to_page(&mut self, page: u32) {
        if page != self.page {
            self.page = page;
            self.selected = 0;
            self.query.invalidate();
        }
    }

    pub fn apply(&mut self, event: BrowserEvent<T>) {
        match event {
            BrowserEvent::Fetched(response) => match self.query.accept(response) {
                Accepted::Applied => {
                    let items = self.query.items();
                    self.exchanges.extend(T::exchange_options(items));
                    self.currencies.extend(T::currency_options(items));
                    self.selected = self.selected.min(items.len().saturating_sub(1));
                    // A deletion can leave us past the last page.
                    let pages = self.query.page().pages;
                    if pages > 0 && self.page > pages {
                        self.go_to_page(pages);
                    }
                }
                Accepted::Failed(e) => {
                    log::warn!("{} list fetch failed: {e}", T::PATH);
                    if e.is_unauthorized() {
                        self.fail(SESSION_EXPIRED);
                    } else {
                        self.fail(e.user_message(LOAD_FAILED));
                    }
                }
                Accepted::Stale => {}
            },
            BrowserEvent::Mutated {
                result,
                success,
                failure,
                from_form,
            } => match result {
                Ok(()) => {
                    if from_form && matches!(self.mode, BrowseMode::Form(_)) {
                        self.mode = BrowseMode::Normal;
                    }
                    self.notify(success);
                    self.query.invalidate();
                }
                Err(e) => {
                    log::warn!("{} mutation failed: {e}", T::PATH);
                    if let BrowseMode::Form(ref mut form) = self.mode {
                        form.set_saving(false);
                    }
                    self.fail(e.user_message(failure));
                }
            },
        }
    }

    /// Handle a key event. Returns a BrowseAction indicating what the caller should do.
    pub fn handle_key_event(&mut self, code: KeyCode) -> BrowseAction {
        self.toast = None;

        match self.mode {
            BrowseMode::Normal => return self.handle_normal_key(code),
            BrowseMode::Search(_) => self.handle_search_key(code),
            BrowseMode::ClientId(_)
            | BrowseMode::AssetId(_)
            | BrowseMode::DateRange(_)
            | BrowseMode::GotoPage(_) => match code {
                KeyCode::Esc => self.mode = BrowseMode::Normal,
                KeyCode::Enter => self.submit_input(),
                KeyCode::Backspace => self.input_backspace(),
                KeyCode::Char(c) => self.input_push(c),
                _ => {}
            },
            BrowseMode::ConfirmDelete { id, .. } => {
                self.mode = BrowseMode::Normal;
                if matches!(code, KeyCode::Char('y') | KeyCode::Char('Y')) {
                    return BrowseAction::Delete(id);
                }
            }
            BrowseMode::Form(ref mut form) => match form.handle_key(code) {
                FormAction::Continue => {}
                FormAction::Cancel => self.mode = BrowseMode::Normal,
                FormAction::Submit => return BrowseAction::Save,
            },
        }
        BrowseAction::Continue
    }

    fn handle_normal_key(&mut self, code: KeyCode) -> BrowseAction {
        let rows = self.query.items().len();
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return BrowseAction::Close,
            KeyCode::Down => {
                if self.selected + 1 < rows {
                    self.selected += 1;
                }
            }
            KeyCode::Up => self.selected = self.selected.saturating_sub(1),
            KeyCode::Char('n') | KeyCode::Right | KeyCode::PageDown => {
                if self.page < self.total_pages() {
                    self.go_to_page(self.page + 1);
                }
            }
            KeyCode::Char('p') | KeyCode::Left | KeyCode::PageUp => {
                if self.page > 1 {
                    self.go_to_page(self.page - 1);
                }
            }
            KeyCode::Char('g') => self.mode = BrowseMode::GotoPage(String::new()),
            KeyCode::Char('R') | KeyCode::F(5) => self.query.invalidate(),
            KeyCode::Char('x') => return BrowseAction::Export,
            KeyCode::Char('+') | KeyCode::Char('i') => {
                self.mode = BrowseMode::Form(EntityForm::new(
                    format!("{} | novo registro", T::TITLE),
                    T::form_fields(),
                    blank_form::<T>(),
                    None,
                ));
            }
            KeyCode::Enter => {
                if let Some(row) = self.query.items().get(self.selected) {
                    let form = EntityForm::new(
                        format!("{} | editar #{}", T::TITLE, row.id()),
                        T::form_fields(),
                        row.form_values(),
                        Some(row.id()),
                    );
                    self.mode = BrowseMode::Form(form);
                }
            }
            KeyCode::Char('D') | KeyCode::Delete => {
                if let Some(row) = self.query.items().get(self.selected) {
                    self.mode = BrowseMode::ConfirmDelete {
                        id: row.id(),
                        summary: row.summary(),
                    };
                }
            }
            KeyCode::Char('T') if T::STATUS_TOGGLE.is_some() => {
                if let Some(row) = self.query.items().get(self.selected) {
                    return BrowseAction::Toggle(row.id());
                }
            }
            KeyCode::Char(c) if !self.query.is_loading() => self.handle_filter_key(c),
            _ => {}
        }
        BrowseAction::Continue
    }

    fn handle_filter_key(&mut self, c: char) {
        let caps = T::FILTERS;
        match c {
            '/' => self.mode = BrowseMode::Search(self.filters.search.clone()),
            's' if caps.status => {
                self.filters.set_status(self.filters.status.cycle());
                self.filters_changed();
            }
            't' if caps.kind => {
                let next = match self.filters.kind.as_deref() {
                    None | Some("all") => TransactionType::Deposit.as_str(),
                    Some("deposit") => TransactionType::Withdrawal.as_str(),
                    _ => "all",
                };
                self.filters.set_type(next);
                self.filters_changed();
            }
            'c' if caps.client => {
                let current = self.filters.client_id.map(|id| id.to_string());
                self.mode = BrowseMode::ClientId(current.unwrap_or_default());
            }
            'a' if caps.asset => {
                let current = self.filters.asset_id.map(|id| id.to_string());
                self.mode = BrowseMode::AssetId(current.unwrap_or_default());
            }
            'e' if caps.exchange => {
                let next = next_option(self.filters.exchange.as_deref(), &self.exchanges);
                self.filters.set_exchange(next);
                self.filters_changed();
            }
            'm' if caps.currency => {
                let next = next_option(self.filters.currency.as_deref(), &self.currencies);
                self.filters.set_currency(next);
                self.filters_changed();
            }
            'd' if caps.date_range => self.mode = BrowseMode::DateRange(String::new()),
            'r' => {
                if !self.filters.is_default() {
                    self.filters.reset();
                    self.filters_changed();
                }
            }
            _ => {}
        }
    }

    /// Search applies as it is typed; Esc clears it.
    fn handle_search_key(&mut self, code: KeyCode) {
        let BrowseMode::Search(ref mut input) = self.mode else {
            return;
        };
        match code {
            KeyCode::Enter => {
                self.mode = BrowseMode::Normal;
                return;
            }
            KeyCode::Esc => {
                input.clear();
                self.mode = BrowseMode::Normal;
            }
            KeyCode::Backspace => {
                input.pop();
            }
            KeyCode::Char(c) => input.push(c),
            _ => return,
        }
        let search = match self.mode {
            BrowseMode::Search(ref s) => s.clone(),
            _ => String::new(),
        };
        if search != self.filters.search {
            self.filters.set_search(search);
            self.filters_changed();
        }
    }

    fn input_push(&mut self, c: char) {
        match &mut self.mode {
            BrowseMode::ClientId(s) | BrowseMode::AssetId(s) | BrowseMode::GotoPage(s) => {
                if c.is_ascii_digit() {
                    s.push(c);
                }
            }
            BrowseMode::DateRange(s) => {
                if c.is_ascii_digit() || matches!(c, '-' | '.') {
                    s.push(c);
                }
            }
            _ => {}
        }
    }

    fn input_backspace(&mut self) {
        match &mut self.mode {
            BrowseMode::ClientId(s)
            | BrowseMode::AssetId(s)
            | BrowseMode::DateRange(s)
            | BrowseMode::GotoPage(s) => {
                s.pop();
            }
            _ => {}
        }
    }

    fn submit_input(&mut self) {
        let mode = std::mem::replace(&mut self.mode, BrowseMode::Normal);
        match mode {
            BrowseMode::ClientId(input) => match parse_id(&input) {
                Ok(id) if id != self.filters.client_id => {
                    self.filters.set_client_id(id);
                    self.filters_changed();
                }
                Ok(_) => {}
                Err(msg) => self.fail(msg),
            },
            BrowseMode::AssetId(input) => match parse_id(&input) {
                Ok(id) if id != self.filters.asset_id => {
                    self.filters.set_asset_id(id);
                    self.filters_changed();
                }
                Ok(_) => {}
                Err(msg) => self.fail(msg),
            },
            BrowseMode::DateRange(input) => match parse_date_range(&input) {
                Ok(range) => {
                    self.filters.set_date_range(range);
                    self.filters_changed();
                }
                Err(msg) => self.fail(msg),
            },
            BrowseMode::GotoPage(input) => match input.trim().parse::<u32>() {
                Ok(page) if (1..=self.total_pages()).contains(&page) => self.go_to_page(page),
                _ => self.fail(format!("Página inválida: {}", input.trim())),
            },
            other => self.mode = other,
        }
    }

    /// Build the create/update call for the open form. Validation failures
    /// stay in the form next to their fields.
    pub fn prepare_save(&mut self) -> Option<Mutation> {
        let BrowseMode::Form(ref mut form) = self.mode else {
            return None;
        };
        let messages = T::MESSAGES;
        let (built, success, failure) = match form.editing() {
            Some(id) => (
                T::update_payload(form.values()).map(|payload| -> Job {
                    Box::new(move |api| api.update::<T>(id, &payload).map(|_| ()))
                }),
                messages.updated,
                messages.update_failed,
            ),
            None => (
                T::create_payload(form.values()).map(|payload| -> Job {
                    Box::new(move |api| api.create::<T>(&payload).map(|_| ()))
                }),
                messages.created,
                messages.create_failed,
            ),
        };

        match built {
            Ok(job) => {
                form.set_errors(Vec::new());
                form.set_saving(true);
                Some(Mutation {
                    job,
                    success,
                    failure,
                    from_form: true,
                })
            }
            Err(CarteiraError::Validation(errors)) => {
                form.set_errors(errors);
                None
            }
            Err(e) => {
                let msg = e.user_message(failure);
                self.fail(msg);
                None
            }
        }
    }

    pub fn delete_mutation(&self, id: i64) -> Mutation {
        Mutation {
            job: Box::new(move |api| api.delete::<T>(id)),
            success: T::MESSAGES.deleted,
            failure: T::MESSAGES.delete_failed,
            from_form: false,
        }
    }

    pub fn toggle_mutation(&self, id: i64) -> Option<Mutation> {
        let toggle = T::STATUS_TOGGLE?;
        Some(Mutation {
            job: Box::new(move |api| T::toggle_active(api, id)),
            success: toggle.success,
            failure: toggle.failure,
            from_form: false,
        })
    }

    /// Export the rows on screen. Nothing happens when there are none.
    pub fn export(&mut self) {
        match export_to_csv(
            self.query.items(),
            &T::export_headers(),
            T::EXPORT_NAME,
            &self.export_dir,
        ) {
            Ok(Some(path)) => {
                log::info!("exported {} rows to {}", self.query.items().len(), path.display());
                self.notify(format!("{EXPORTED} {}", path.display()));
            }
            Ok(None) => {}
            Err(e) => self.fail(format!("Erro ao exportar: {e}")),
        }
    }

    pub fn run(&mut self, api: &ApiClient) -> Result<()> {
        tui::with_terminal(|terminal| self.event_loop(terminal, api))
    }

    fn event_loop(&mut self, terminal: &mut DefaultTerminal, api: &ApiClient) -> Result<()> {
        let (tx, rx) = mpsc::channel::<BrowserEvent<T>>();

        loop {
            while let Ok(event) = rx.try_recv() {
                self.apply(event);
            }
            if let Some((key, generation)) = self.next_fetch() {
                spawn_list::<T, BrowserEvent<T>>(api.clone(), key, generation, tx.clone());
            }

            terminal.draw(|frame| self.draw_frame(frame))?;

            if !event::poll(POLL_INTERVAL)? {
                continue;
            }
            if let Event::Key(KeyEvent {
                code,
                modifiers,
                kind,
                ..
            }) = event::read()?
            {
                if kind != KeyEventKind::Press {
                    continue;
                }
                if modifiers.contains(KeyModifiers::CONTROL) && code == KeyCode::Char('c') {
                    break;
                }

                let mutation = match self.handle_key_event(code) {
                    BrowseAction::Close => break,
                    BrowseAction::Continue => None,
                    BrowseAction::Export => {
                        self.export();
                        None
                    }
                    BrowseAction::Save => self.prepare_save(),
                    BrowseAction::Delete(id) => Some(self.delete_mutation(id)),
                    BrowseAction::Toggle(id) => self.toggle_mutation(id),
                };
                if let Some(mutation) = mutation {
                    spawn_mutation(api.clone(), mutation, tx.clone());
                }
            }
        }
        Ok(())
    }

    /// Draw the browser into the given frame.
    pub fn draw_frame(&mut self, frame: &mut Frame) {
        let area = frame.area();
        let areas = Layout::vertical([
            Constraint::Length(1), // title
            Constraint::Length(1), // filters
            Constraint::Fill(1),   // table
            Constraint::Length(1), // status
            Constraint::Length(1), // keys
        ])
        .split(area);
        let (title_area, filter_area, table_area, status_area, keys_area) =
            (areas[0], areas[1], areas[2], areas[3], areas[4]);

        let page = self.query.page();
        let title = format!(
            "{}  |  Página {} de {}  |  {} registros",
            T::TITLE,
            self.page,
            self.total_pages(),
            page.total
        );
        frame.render_widget(Paragraph::new(title).style(HEADER_STYLE), title_area);

        let filters = self.filters.describe();
        let filters = if filters.is_empty() {
            "Sem filtros".to_string()
        } else {
            format!("Filtros: {filters}")
        };
        frame.render_widget(Paragraph::new(filters).style(FOOTER_STYLE), filter_area);

        self.draw_table(frame, table_area);

        let status = match (&self.toast, self.query.error()) {
            (Some(toast), _) => {
                let style = if toast.error { ERROR_STYLE } else { SUCCESS_STYLE };
                Paragraph::new(toast.text.clone()).style(style)
            }
            (None, Some(err)) => Paragraph::new(format!("Falha ao carregar: {err}")).style(ERROR_STYLE),
            (None, None) => {
                let rows = self.query.items().len();
                let text = if rows == 0 {
                    String::new()
                } else {
                    format!("Linha {} de {}", self.selected + 1, rows)
                };
                Paragraph::new(text).style(FOOTER_STYLE)
            }
        };
        frame.render_widget(status, status_area);

        let keys = match &self.mode {
            BrowseMode::Normal | BrowseMode::Form(_) => {
                Paragraph::new(self.key_hints()).style(FOOTER_STYLE)
            }
            BrowseMode::Search(input) => {
                Paragraph::new(format!("{} {input}\u{2588}", T::SEARCH_PLACEHOLDER))
            }
            BrowseMode::ClientId(input) => {
                Paragraph::new(format!("ID do cliente (vazio limpa): {input}\u{2588}"))
            }
            BrowseMode::AssetId(input) => {
                Paragraph::new(format!("ID do ativo (vazio limpa): {input}\u{2588}"))
            }
            BrowseMode::DateRange(input) => Paragraph::new(format!(
                "{} (AAAA-MM-DD..AAAA-MM-DD): {input}\u{2588}",
                T::DATE_RANGE_LABEL
            )),
            BrowseMode::GotoPage(input) => Paragraph::new(format!("Ir para página: {input}\u{2588}")),
            BrowseMode::ConfirmDelete { summary, .. } => Paragraph::new(Line::from(vec![
                Span::styled(format!("{} ", T::MESSAGES.confirm_delete), ERROR_STYLE),
                Span::raw(format!("{summary} (y/n)")),
            ])),
        };
        frame.render_widget(keys, keys_area);

        if let BrowseMode::Form(ref form) = self.mode {
            form.draw(frame, area);
        }
    }

    fn key_hints(&self) -> String {
        let caps = T::FILTERS;
        let mut hints = vec!["\u{2191}/\u{2193}:select", "n/p:page", "/:search"];
        if caps.status {
            hints.push("s:status");
        }
        if caps.kind {
            hints.push("t:type");
        }
        if caps.client {
            hints.push("c:client");
        }
        if caps.asset {
            hints.push("a:asset");
        }
        if caps.exchange {
            hints.push("e:exchange");
        }
        if caps.currency {
            hints.push("m:currency");
        }
        if caps.date_range {
            hints.push("d:dates");
        }
        hints.extend(["r:reset", "R:refresh", "+:add", "Enter:edit", "D:delete"]);
        if T::STATUS_TOGGLE.is_some() {
            hints.push("T:toggle");
        }
        hints.extend(["x:export", "q:quit"]);
        hints.join("  ")
    }

    fn draw_table(&mut self, frame: &mut Frame, area: Rect) {
        let view = self.table.render(self.query.items(), self.query.is_loading());
        let span = view.headers.len() as u16;
        let data_cols = span.saturating_sub(u16::from(self.table.has_actions()));
        let col_width = area
            .width
            .saturating_sub(ACTIONS_WIDTH + span.saturating_sub(1))
            .checked_div(data_cols)
            .unwrap_or(area.width)
            .max(4) as usize;

        let mut widths: Vec<Constraint> = (0..data_cols).map(|_| Constraint::Fill(1)).collect();
        if self.table.has_actions() {
            widths.push(Constraint::Length(ACTIONS_WIDTH));
        }

        let header = Row::new(view.headers.iter().map(|h| {
            if h.sortable {
                Cell::from(format!("{} \u{2195}", h.label))
            } else {
                Cell::from(h.label.clone())
            }
        }))
        .style(HEADER_STYLE)
        .bottom_margin(1);

        let message = if view.is_loading {
            Some(LOADING_MESSAGE)
        } else {
            match view.body {
                TableBody::Empty { message, .. } => Some(message),
                TableBody::Rows(_) => None,
            }
        };

        let rows: Vec<Row> = match (&view.body, message) {
            (TableBody::Rows(rows), None) => rows
                .iter()
                .map(|r| {
                    let mut height = 1;
                    let cells: Vec<Cell> = r
                        .cells
                        .iter()
                        .map(|c| {
                            let (text, lines) = tui::wrap_text(&c.text, col_width);
                            height = height.max(lines);
                            Cell::from(text).style(tui::cell_style(c.style))
                        })
                        .collect();
                    Row::new(cells).height(height)
                })
                .collect(),
            _ => Vec::new(),
        };

        if rows.is_empty() {
            self.table_state.select(None);
        } else {
            self.table_state.select(Some(self.selected));
        }
        let table = Table::new(rows, widths)
            .header(header)
            .column_spacing(1)
            .row_highlight_style(SELECTED_STYLE);
        frame.render_stateful_widget(table, area, &mut self.table_state);

        if let Some(message) = message {
            if area.height > 2 {
                let below_header = Rect {
                    y: area.y + 2,
                    height: 1,
                    ..area
                };
                frame.render_widget(
                    Paragraph::new(message)
                        .style(FOOTER_STYLE)
                        .alignment(ratatui::layout::Alignment::Center),
                    below_header,
                );
            }
        }
    }
}

fn spawn_mutation<T: Resource>(api: ApiClient, mutation: Mutation, tx: Sender<BrowserEvent<T>>) {
    thread::spawn(move || {
        let result = (mutation.job)(&api);
        let event = BrowserEvent::Mutated {
            result,
            success: mutation.success,
            failure: mutation.failure,
            from_form: mutation.from_form,
        };
        if tx.send(event).is_err() {
            log::debug!("mutation finished after its view closed");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{ParamValue, StatusFilter};
    use crate::models::{Client, Page, Transaction};
    use chrono::NaiveDate;
    use ratatui::{backend::TestBackend, Terminal};

    impl<T: EntityView> ListBrowser<T> {
        fn status_message(&self) -> Option<&str> {
            self.toast.as_ref().map(|t| t.text.as_str())
        }

        fn filters(&self) -> &FilterState {
            &self.filters
        }

        fn page(&self) -> u32 {
            self.page
        }

        fn items(&self) -> &[T] {
            self.query.items()
        }
    }

    fn client(id: i64, name: &str) -> Client {
        Client {
            id,
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            is_active: true,
            created_at: "2024-06-01T10:00:00".to_string(),
            updated_at: None,
        }
    }

    fn page(items: Vec<Client>, pages: u32) -> Page<Client> {
        Page {
            total: items.len() as u64,
            items,
            page: 1,
            size: 20,
            pages,
        }
    }

    fn browser() -> ListBrowser<Client> {
        ListBrowser::new(&Settings::default())
    }

    /// Issue the pending fetch and answer it.
    fn load(b: &mut ListBrowser<Client>, items: Vec<Client>, pages: u32) {
        let (key, generation) = b.next_fetch().expect("fetch pending");
        b.apply(BrowserEvent::Fetched(ListResponse {
            key,
            generation,
            result: Ok(page(items, pages)),
        }));
    }

    fn type_str(b: &mut ListBrowser<Client>, s: &str) {
        for c in s.chars() {
            b.handle_key_event(KeyCode::Char(c));
        }
    }

    fn screen(b: &mut ListBrowser<Client>) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 20)).unwrap();
        terminal.draw(|f| b.draw_frame(f)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    #[test]
    fn test_first_fetch_uses_default_filters() {
        let mut b = browser();
        let (key, _) = b.next_fetch().unwrap();
        assert_eq!(key.entity, "/clients");
        assert_eq!(key.params.to_string(), "page=1&size=20");
        assert!(b.next_fetch().is_none());
    }

    #[test]
    fn test_status_key_refetches_from_first_page() {
        let mut b = browser();
        load(&mut b, vec![client(1, "Ana")], 3);
        b.handle_key_event(KeyCode::Char('n'));
        assert_eq!(b.page(), 2);
        load(&mut b, vec![client(2, "Bia")], 3);

        b.handle_key_event(KeyCode::Char('s'));
        assert_eq!(b.filters().status, StatusFilter::Active);
        assert_eq!(b.page(), 1);
        let (key, _) = b.next_fetch().unwrap();
        assert_eq!(key.params.get("is_active"), Some(&ParamValue::Bool(true)));
        assert_eq!(key.params.get("page"), Some(&ParamValue::Int(1)));
    }

    #[test]
    fn test_filter_keys_ignored_while_loading() {
        let mut b = browser();
        b.next_fetch().unwrap();
        b.handle_key_event(KeyCode::Char('s'));
        assert_eq!(b.filters().status, StatusFilter::All);
    }

    #[test]
    fn test_live_search_drops_superseded_response() {
        let mut b = browser();
        load(&mut b, vec![client(1, "Ana")], 1);

        b.handle_key_event(KeyCode::Char('/'));
        type_str(&mut b, "b");
        let (first, g1) = b.next_fetch().unwrap();
        type_str(&mut b, "i");
        let (second, g2) = b.next_fetch().unwrap();
        assert_eq!(b.filters().search, "bi");

        b.apply(BrowserEvent::Fetched(ListResponse {
            key: second,
            generation: g2,
            result: Ok(page(vec![client(2, "Bia")], 1)),
        }));
        b.apply(BrowserEvent::Fetched(ListResponse {
            key: first,
            generation: g1,
            result: Ok(page(vec![client(3, "Bruno")], 1)),
        }));
        assert_eq!(b.items().len(), 1);
        assert_eq!(b.items()[0].name, "Bia");
    }

    #[test]
    fn test_escape_clears_search() {
        let mut b = browser();
        load(&mut b, vec![], 0);
        b.handle_key_event(KeyCode::Char('/'));
        type_str(&mut b, "ana");
        b.handle_key_event(KeyCode::Esc);
        assert_eq!(b.filters().search, "");
        assert!(b.next_fetch().is_some());
    }

    #[test]
    fn test_failed_fetch_keeps_rows_and_reports() {
        let mut b = browser();
        load(&mut b, vec![client(1, "Ana")], 1);
        b.handle_key_event(KeyCode::Char('R'));
        let (key, generation) = b.next_fetch().unwrap();
        b.apply(BrowserEvent::Fetched(ListResponse {
            key,
            generation,
            result: Err(CarteiraError::Remote {
                status: 500,
                detail: Some("Banco indisponível".to_string()),
            }),
        }));
        assert_eq!(b.items().len(), 1);
        assert_eq!(b.status_message(), Some("Banco indisponível"));
    }

    #[test]
    fn test_delete_needs_confirmation() {
        let mut b = browser();
        load(&mut b, vec![client(1, "Ana"), client(2, "Bia")], 1);
        b.handle_key_event(KeyCode::Down);
        assert_eq!(b.handle_key_event(KeyCode::Char('D')), BrowseAction::Continue);
        assert_eq!(b.handle_key_event(KeyCode::Char('y')), BrowseAction::Delete(2));

        b.handle_key_event(KeyCode::Char('D'));
        assert_eq!(b.handle_key_event(KeyCode::Char('n')), BrowseAction::Continue);
    }

    #[test]
    fn test_toggle_only_where_supported() {
        let mut b = browser();
        load(&mut b, vec![client(7, "Ana")], 1);
        assert_eq!(b.handle_key_event(KeyCode::Char('T')), BrowseAction::Toggle(7));
        assert!(b.toggle_mutation(7).is_some());

        let t: ListBrowser<Transaction> = ListBrowser::new(&Settings::default());
        assert!(t.toggle_mutation(7).is_none());
    }

    #[test]
    fn test_invalid_form_stays_open_with_errors() {
        let mut b = browser();
        load(&mut b, vec![], 0);
        b.handle_key_event(KeyCode::Char('+'));
        type_str(&mut b, "A");
        assert_eq!(b.handle_key_event(KeyCode::Enter), BrowseAction::Save);
        assert!(b.prepare_save().is_none());
        match b.mode {
            BrowseMode::Form(ref form) => {
                assert!(!form.is_saving());
                assert!(form.errors().iter().any(|e| e.field == "name"));
                assert!(form.errors().iter().any(|e| e.field == "email"));
            }
            _ => panic!("form closed"),
        }
    }

    #[test]
    fn test_successful_save_closes_form_and_refetches() {
        let mut b = browser();
        load(&mut b, vec![client(1, "Ana")], 1);
        b.handle_key_event(KeyCode::Enter);
        let mutation = b.prepare_save().expect("valid edit");
        assert_eq!(mutation.success, Client::MESSAGES.updated);

        b.apply(BrowserEvent::Mutated {
            result: Ok(()),
            success: mutation.success,
            failure: mutation.failure,
            from_form: true,
        });
        assert!(matches!(b.mode, BrowseMode::Normal));
        assert_eq!(b.status_message(), Some("Cliente atualizado com sucesso!"));
        assert!(b.next_fetch().is_some());
    }

    #[test]
    fn test_failed_save_reenables_form() {
        let mut b = browser();
        load(&mut b, vec![client(1, "Ana")], 1);
        b.handle_key_event(KeyCode::Enter);
        let mutation = b.prepare_save().unwrap();
        b.apply(BrowserEvent::Mutated {
            result: Err(CarteiraError::Remote {
                status: 400,
                detail: None,
            }),
            success: mutation.success,
            failure: mutation.failure,
            from_form: true,
        });
        assert_eq!(b.status_message(), Some("Erro ao atualizar cliente"));
        assert!(matches!(b.mode, BrowseMode::Form(ref f) if !f.is_saving()));
    }

    #[test]
    fn test_deleting_last_row_of_last_page_steps_back() {
        let mut b = browser();
        load(&mut b, vec![client(1, "Ana")], 2);
        b.handle_key_event(KeyCode::Char('n'));
        load(&mut b, vec![client(2, "Bia")], 2);
        b.apply(BrowserEvent::Mutated {
            result: Ok(()),
            success: Client::MESSAGES.deleted,
            failure: Client::MESSAGES.delete_failed,
            from_form: false,
        });
        load(&mut b, vec![], 1);
        assert_eq!(b.page(), 1);
    }

    #[test]
    fn test_export_writes_rows_on_screen() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            export_dir: dir.path().to_string_lossy().into_owned(),
            ..Settings::default()
        };
        let mut b: ListBrowser<Client> = ListBrowser::new(&settings);

        b.export();
        assert!(b.status_message().is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        load(&mut b, vec![client(1, "Ana")], 1);
        b.export();
        assert!(b.status_message().unwrap().starts_with(EXPORTED));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_date_range_input() {
        let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day);
        assert_eq!(parse_date_range("  "), Ok(None));
        assert_eq!(
            parse_date_range("2024-01-01..2024-01-31"),
            Ok(Some(DateRange::from_dates(d(2024, 1, 1), d(2024, 1, 31))))
        );
        assert_eq!(
            parse_date_range("2024-01-01.."),
            Ok(Some(DateRange::from_dates(d(2024, 1, 1), None)))
        );
        assert_eq!(
            parse_date_range("2024-03-05"),
            Ok(Some(DateRange::from_dates(d(2024, 3, 5), d(2024, 3, 5))))
        );
        assert!(parse_date_range("2024-02-01..2024-01-01").is_err());
        assert!(parse_date_range("2024-13-01").is_err());
    }

    #[test]
    fn test_client_id_filter_rejects_zero() {
        let mut t: ListBrowser<Transaction> = ListBrowser::new(&Settings::default());
        let (key, generation) = t.next_fetch().unwrap();
        t.apply(BrowserEvent::Fetched(ListResponse {
            key,
            generation,
            result: Ok(Page::default()),
        }));
        t.handle_key_event(KeyCode::Char('c'));
        t.handle_key_event(KeyCode::Char('0'));
        t.handle_key_event(KeyCode::Enter);
        assert_eq!(t.filters().client_id, None);
        assert!(t.status_message().is_some());

        t.handle_key_event(KeyCode::Char('c'));
        t.handle_key_event(KeyCode::Char('4'));
        t.handle_key_event(KeyCode::Enter);
        assert_eq!(t.filters().client_id, Some(4));
    }

    #[test]
    fn test_screen_shows_rows_and_empty_state() {
        let mut b = browser();
        b.next_fetch().unwrap();
        assert!(screen(&mut b).contains(LOADING_MESSAGE));

        let mut b = browser();
        load(&mut b, vec![], 0);
        let text = screen(&mut b);
        assert!(text.contains("Clientes"));
        assert!(text.contains("Nenhum registro encontrado"));

        let mut b = browser();
        load(&mut b, vec![client(3, "Ana")], 1);
        let text = screen(&mut b);
        assert!(text.contains("Ana"));
        assert!(text.contains("Ativo"));
        assert!(text.contains("#3"));
    }
}
