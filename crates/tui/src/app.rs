use std::{collections::BTreeSet, io, thread, time::Duration};

use anyhow::{Context, Result};
use chrono::{Local, TimeZone};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use microair_core::{
    catalog::{self, CityDef, PlaneDef},
    Api, FileStore, Job, PlaneState, Player,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Tabs, Wrap},
    Frame, Terminal,
};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

const TICK_RATE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
struct Theme {
    primary_fg: Color,
    accent: Color,
    muted: Color,
    selection_bg: Color,
    success: Color,
    warning: Color,
    danger: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary_fg: Color::White,
            accent: Color::Cyan,
            muted: Color::DarkGray,
            selection_bg: Color::DarkGray,
            success: Color::Green,
            warning: Color::Yellow,
            danger: Color::Red,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tab {
    Market,
    Cities,
    Planes,
}

impl Tab {
    const ALL: [Tab; 3] = [Tab::Market, Tab::Cities, Tab::Planes];

    fn title(self) -> &'static str {
        match self {
            Tab::Market => "Market",
            Tab::Cities => "Cities",
            Tab::Planes => "Planes",
        }
    }

    fn index(self) -> usize {
        Tab::ALL.iter().position(|tab| *tab == self).unwrap_or(0)
    }

    fn next(self) -> Self {
        Tab::ALL[(self.index() + 1) % Tab::ALL.len()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MarketFocus {
    Cities,
    Planes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CityFocus {
    Cities,
    Jobs,
}

/// Pop-up pickers layered over the current tab.
#[derive(Debug, Clone)]
enum Modal {
    /// Choose where a newly bought plane starts.
    StartCity { plane_def: String, options: Vec<String>, cursor: usize },
    /// Choose which grounded plane takes the selected jobs.
    LoadPlane { options: Vec<String>, cursor: usize },
    /// Choose the destination of a departure.
    Destination {
        plane_id: String,
        job_ids: Vec<String>,
        options: Vec<String>,
        cursor: usize,
    },
}

impl Modal {
    fn cursor_mut(&mut self) -> (&mut usize, usize) {
        match self {
            Modal::StartCity { options, cursor, .. }
            | Modal::LoadPlane { options, cursor }
            | Modal::Destination {
                options, cursor, ..
            } => {
                let len = options.len();
                (cursor, len)
            }
        }
    }
}

enum AppEvent {
    Input(Event),
    Tick,
}

/// Loaded job board of the city currently open in the Cities tab.
struct OpenBoard {
    city_id: String,
    jobs: Vec<Job>,
    jobs_expire: i64,
    cursor: usize,
    selected: BTreeSet<String>,
}

/// Terminal frontend over the player API.
pub struct MicroairApp {
    api: Api<FileStore>,
    player_id: String,
    player: Option<Player>,
    tab: Tab,
    market_focus: MarketFocus,
    market_city_cursor: usize,
    market_plane_cursor: usize,
    city_focus: CityFocus,
    city_cursor: usize,
    board: Option<OpenBoard>,
    plane_cursor: usize,
    modal: Option<Modal>,
    status: String,
    status_is_error: bool,
    should_quit: bool,
    theme: Theme,
}

impl MicroairApp {
    pub fn new(api: Api<FileStore>, player_id: String) -> Self {
        Self {
            api,
            player_id,
            player: None,
            tab: Tab::Market,
            market_focus: MarketFocus::Cities,
            market_city_cursor: 0,
            market_plane_cursor: 0,
            city_focus: CityFocus::Cities,
            city_cursor: 0,
            board: None,
            plane_cursor: 0,
            modal: None,
            status: "Ready".to_string(),
            status_is_error: false,
            should_quit: false,
            theme: Theme::default(),
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        self.refresh_player();

        let mut stdout = io::stdout();
        enable_raw_mode().context("failed to enter raw mode")?;
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("failed to create terminal")?;
        terminal.hide_cursor()?;
        terminal.clear()?;

        let (event_tx, mut event_rx) = mpsc::channel::<AppEvent>(128);
        spawn_input_thread(event_tx);

        loop {
            terminal.draw(|frame| self.draw(frame))?;
            if self.should_quit {
                break;
            }
            match event_rx.recv().await {
                Some(AppEvent::Input(Event::Key(key))) => self.handle_key(key),
                Some(AppEvent::Input(_)) => {}
                Some(AppEvent::Tick) => self.handle_tick(),
                None => break,
            }
        }

        restore_terminal(&mut terminal)?;
        Ok(())
    }

    fn now(&self) -> i64 {
        self.api.airline().now()
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status = message.into();
        self.status_is_error = false;
    }

    fn set_error(&mut self, message: impl Into<String>) {
        self.status = message.into();
        self.status_is_error = true;
    }

    fn refresh_player(&mut self) {
        match self.api.airline().player(&self.player_id) {
            Ok(player) => self.player = Some(player),
            Err(err) => {
                error!(%err, "failed to refresh player");
                self.set_error(format!("Failed to load player: {err}"));
            }
        }
    }

    fn handle_tick(&mut self) {
        self.settle_landed();
        self.refresh_player();
        let expired = self
            .board
            .as_ref()
            .map(|board| board.jobs_expire <= self.now())
            .unwrap_or(false);
        if expired {
            if let Some(city_id) = self.board.as_ref().map(|board| board.city_id.clone()) {
                debug!(%city_id, "board expired, reloading");
                self.open_board(&city_id);
            }
        }
    }

    fn settle_landed(&mut self) {
        match self.api.airline().settle_due(&self.player_id) {
            Ok(settled) if settled.is_empty() => {}
            Ok(settled) => {
                let credited: u64 = settled.iter().map(|(_, s)| s.credited).sum();
                let balance = settled
                    .last()
                    .map(|(_, s)| s.balance)
                    .unwrap_or_default();
                info!(planes = settled.len(), credited, balance, "flights settled");
                self.set_status(format!(
                    "{} plane(s) landed, +{credited}, balance {balance}",
                    settled.len()
                ));
            }
            Err(err) => {
                error!(%err, "failed to settle landed planes");
                self.set_error(format!("Settlement failed: {err}"));
            }
        }
    }

    fn owned_city_ids(&self) -> Vec<String> {
        self.player
            .as_ref()
            .map(|player| player.cities.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn plane_ids(&self) -> Vec<String> {
        self.player
            .as_ref()
            .map(|player| player.planes.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn plane(&self, plane_id: &str) -> Option<&PlaneState> {
        self.player.as_ref().and_then(|player| player.planes.get(plane_id))
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if self.modal.is_some() {
            self.handle_modal_key(key);
            return;
        }
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Tab => {
                self.tab = self.tab.next();
                self.refresh_player();
            }
            KeyCode::Char('r') => {
                self.refresh_player();
                self.set_status("Refreshed");
            }
            _ => match self.tab {
                Tab::Market => self.handle_market_key(key),
                Tab::Cities => self.handle_cities_key(key),
                Tab::Planes => self.handle_planes_key(key),
            },
        }
    }

    fn handle_market_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Left | KeyCode::Right | KeyCode::Char('h') | KeyCode::Char('l') => {
                self.market_focus = match self.market_focus {
                    MarketFocus::Cities => MarketFocus::Planes,
                    MarketFocus::Planes => MarketFocus::Cities,
                };
            }
            KeyCode::Up | KeyCode::Char('k') => self.move_market_cursor(-1),
            KeyCode::Down | KeyCode::Char('j') => self.move_market_cursor(1),
            KeyCode::Enter => match self.market_focus {
                MarketFocus::Cities => self.buy_selected_city(),
                MarketFocus::Planes => self.begin_plane_purchase(),
            },
            _ => {}
        }
    }

    fn move_market_cursor(&mut self, delta: isize) {
        match self.market_focus {
            MarketFocus::Cities => {
                self.market_city_cursor =
                    step(self.market_city_cursor, delta, catalog::cities().count());
            }
            MarketFocus::Planes => {
                self.market_plane_cursor =
                    step(self.market_plane_cursor, delta, catalog::planes().count());
            }
        }
    }

    fn buy_selected_city(&mut self) {
        let Some(def) = catalog::cities().nth(self.market_city_cursor) else {
            return;
        };
        let response = self
            .api
            .post_cities(&self.player_id, &json!({ "city": def.city_id }));
        if response.is_success() {
            info!(city_id = def.city_id, "city bought");
            self.set_status(format!(
                "Bought {}, balance {}",
                def.name, response.body["balance"]
            ));
        } else {
            self.set_error(format!(
                "Could not buy {}: {}",
                def.name,
                response.message_text().unwrap_or("request failed")
            ));
        }
        self.refresh_player();
    }

    fn begin_plane_purchase(&mut self) {
        let Some(def) = catalog::planes().nth(self.market_plane_cursor) else {
            return;
        };
        let options = self.owned_city_ids();
        if options.is_empty() {
            self.set_error("Buy a city first; planes start at an owned city");
            return;
        }
        self.modal = Some(Modal::StartCity {
            plane_def: def.plane_id.to_string(),
            options,
            cursor: 0,
        });
    }

    fn handle_cities_key(&mut self, key: KeyEvent) {
        match (self.city_focus, key.code) {
            (_, KeyCode::Left) | (_, KeyCode::Char('h')) => self.city_focus = CityFocus::Cities,
            (_, KeyCode::Right) => {
                if self.board.is_some() {
                    self.city_focus = CityFocus::Jobs;
                }
            }
            (CityFocus::Cities, KeyCode::Up) | (CityFocus::Cities, KeyCode::Char('k')) => {
                self.city_cursor = step(self.city_cursor, -1, self.owned_city_ids().len());
            }
            (CityFocus::Cities, KeyCode::Down) | (CityFocus::Cities, KeyCode::Char('j')) => {
                self.city_cursor = step(self.city_cursor, 1, self.owned_city_ids().len());
            }
            (CityFocus::Cities, KeyCode::Enter) => {
                if let Some(city_id) = self.owned_city_ids().get(self.city_cursor).cloned() {
                    self.open_board(&city_id);
                    if self.board.is_some() {
                        self.city_focus = CityFocus::Jobs;
                    }
                }
            }
            (CityFocus::Jobs, KeyCode::Up) | (CityFocus::Jobs, KeyCode::Char('k')) => {
                if let Some(board) = self.board.as_mut() {
                    board.cursor = step(board.cursor, -1, board.jobs.len());
                }
            }
            (CityFocus::Jobs, KeyCode::Down) | (CityFocus::Jobs, KeyCode::Char('j')) => {
                if let Some(board) = self.board.as_mut() {
                    board.cursor = step(board.cursor, 1, board.jobs.len());
                }
            }
            (CityFocus::Jobs, KeyCode::Char(' ')) => {
                if let Some(board) = self.board.as_mut() {
                    if let Some(job) = board.jobs.get(board.cursor) {
                        if !board.selected.remove(&job.id) {
                            board.selected.insert(job.id.clone());
                        }
                    }
                }
            }
            (CityFocus::Jobs, KeyCode::Char('l')) => self.begin_load(),
            _ => {}
        }
    }

    fn open_board(&mut self, city_id: &str) {
        let response = self.api.get_city_jobs(&self.player_id, city_id);
        if !response.is_success() {
            self.board = None;
            self.city_focus = CityFocus::Cities;
            self.set_error(format!(
                "No jobs for {}: {}",
                city_id,
                response.message_text().unwrap_or("request failed")
            ));
            return;
        }

        let jobs: Vec<Job> = serde_json::from_value::<std::collections::BTreeMap<String, Job>>(
            response.body["jobs"].clone(),
        )
        .map(|jobs| jobs.into_values().collect())
        .unwrap_or_default();
        let jobs_expire = response.body["jobs_expire"].as_i64().unwrap_or_default();

        let previous = self
            .board
            .take()
            .filter(|board| board.city_id == city_id && board.jobs_expire == jobs_expire);
        let (cursor, selected) = previous
            .map(|board| (board.cursor, board.selected))
            .unwrap_or_default();
        let selected = selected
            .into_iter()
            .filter(|id| jobs.iter().any(|job| &job.id == id))
            .collect();
        self.board = Some(OpenBoard {
            city_id: city_id.to_string(),
            cursor: cursor.min(jobs.len().saturating_sub(1)),
            jobs,
            jobs_expire,
            selected,
        });
        self.set_status(format!("Job board for {}", city_name(city_id)));
    }

    fn begin_load(&mut self) {
        let Some(board) = self.board.as_ref() else {
            return;
        };
        if board.selected.is_empty() {
            self.set_error("Select jobs with Space first");
            return;
        }
        let city_id = board.city_id.clone();
        let options: Vec<String> = self
            .player
            .as_ref()
            .map(|player| {
                player
                    .planes
                    .iter()
                    .filter(|(_, plane)| plane.is_grounded() && plane.current_city_id == city_id)
                    .map(|(id, _)| id.clone())
                    .collect()
            })
            .unwrap_or_default();
        if options.is_empty() {
            self.set_error(format!("No grounded plane at {}", city_name(&city_id)));
            return;
        }
        self.modal = Some(Modal::LoadPlane { options, cursor: 0 });
    }

    fn handle_planes_key(&mut self, key: KeyEvent) {
        let planes = self.plane_ids();
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.plane_cursor = step(self.plane_cursor, -1, planes.len());
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.plane_cursor = step(self.plane_cursor, 1, planes.len());
            }
            KeyCode::Char('a') => {
                if let Some(plane_id) = planes.get(self.plane_cursor) {
                    self.arrive(plane_id);
                }
            }
            KeyCode::Char('d') => {
                if let Some(plane_id) = planes.get(self.plane_cursor).cloned() {
                    self.begin_departure(plane_id, Vec::new());
                }
            }
            _ => {}
        }
    }

    fn begin_departure(&mut self, plane_id: String, job_ids: Vec<String>) {
        let Some(plane) = self.plane(&plane_id) else {
            return;
        };
        if !plane.is_grounded() {
            self.set_error("Plane is already in flight");
            return;
        }
        let current = plane.current_city_id.clone();
        let options: Vec<String> = self
            .owned_city_ids()
            .into_iter()
            .filter(|city_id| *city_id != current)
            .collect();
        if options.is_empty() {
            self.set_error("No other city to fly to");
            return;
        }
        self.modal = Some(Modal::Destination {
            plane_id,
            job_ids,
            options,
            cursor: 0,
        });
    }

    fn arrive(&mut self, plane_id: &str) {
        let response = self.api.put_arrive(&self.player_id, plane_id);
        if response.is_success() {
            self.set_status(format!(
                "Plane {} settled, balance {}",
                short_id(plane_id),
                response.body["balance"]
            ));
        } else {
            self.set_error(format!(
                "Arrival failed: {}",
                response.message_text().unwrap_or("request failed")
            ));
        }
        self.refresh_player();
    }

    fn handle_modal_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => {
                self.modal = None;
                self.set_status("Cancelled");
            }
            KeyCode::Up | KeyCode::Char('k') => {
                if let Some(modal) = self.modal.as_mut() {
                    let (cursor, len) = modal.cursor_mut();
                    *cursor = step(*cursor, -1, len);
                }
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if let Some(modal) = self.modal.as_mut() {
                    let (cursor, len) = modal.cursor_mut();
                    *cursor = step(*cursor, 1, len);
                }
            }
            KeyCode::Enter => {
                if let Some(modal) = self.modal.take() {
                    self.confirm_modal(modal);
                }
            }
            _ => {}
        }
    }

    fn confirm_modal(&mut self, modal: Modal) {
        match modal {
            Modal::StartCity {
                plane_def,
                options,
                cursor,
            } => {
                let Some(city_id) = options.get(cursor) else {
                    return;
                };
                let response = self.api.post_planes(
                    &self.player_id,
                    &json!({ "plane": plane_def, "city": city_id }),
                );
                if response.is_success() {
                    self.set_status(format!(
                        "Bought {} at {}, balance {}",
                        plane_name(&plane_def),
                        city_name(city_id),
                        response.body["balance"]
                    ));
                } else {
                    self.set_error(format!(
                        "Could not buy plane: {}",
                        response.message_text().unwrap_or("request failed")
                    ));
                }
                self.refresh_player();
            }
            Modal::LoadPlane { options, cursor } => {
                let Some(plane_id) = options.get(cursor).cloned() else {
                    return;
                };
                let job_ids: Vec<String> = self
                    .board
                    .as_ref()
                    .map(|board| board.selected.iter().cloned().collect())
                    .unwrap_or_default();
                self.begin_departure(plane_id, job_ids);
            }
            Modal::Destination {
                plane_id,
                job_ids,
                options,
                cursor,
            } => {
                let Some(destination) = options.get(cursor) else {
                    return;
                };
                let response = self.api.put_depart(
                    &self.player_id,
                    &plane_id,
                    &json!({ "loaded_jobs": job_ids, "destination_city_id": destination }),
                );
                if response.is_success() {
                    self.set_status(format!(
                        "Plane {} departed for {} with {} new jobs",
                        short_id(&plane_id),
                        city_name(destination),
                        job_ids.len()
                    ));
                    if let Some(city_id) = self.board.as_ref().map(|b| b.city_id.clone()) {
                        self.open_board(&city_id);
                    }
                } else {
                    self.set_error(format!(
                        "Departure failed: {}",
                        response.message_text().unwrap_or("request failed")
                    ));
                }
                self.refresh_player();
            }
        }
    }

    fn draw(&mut self, frame: &mut Frame) {
        let area = frame.size();
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(5),
                Constraint::Length(4),
            ])
            .split(area);

        self.render_header(frame, layout[0]);
        match self.tab {
            Tab::Market => self.render_market(frame, layout[1]),
            Tab::Cities => self.render_cities(frame, layout[1]),
            Tab::Planes => self.render_planes(frame, layout[1]),
        }
        self.render_status(frame, layout[2]);
        if let Some(modal) = &self.modal {
            self.render_modal(frame, modal);
        }
    }

    fn render_header(&self, frame: &mut Frame, area: Rect) {
        let balance = self
            .player
            .as_ref()
            .map(|player| player.balance.to_string())
            .unwrap_or_else(|| "?".to_string());
        let title = format!(" microair · {} · balance {} ", self.player_id, balance);
        let tabs = Tabs::new(Tab::ALL.iter().map(|tab| tab.title()).collect::<Vec<_>>())
            .select(self.tab.index())
            .block(Block::default().borders(Borders::ALL).title(title))
            .style(Style::default().fg(self.theme.primary_fg))
            .highlight_style(
                Style::default()
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::BOLD),
            );
        frame.render_widget(tabs, area);
    }

    fn render_market(&self, frame: &mut Frame, area: Rect) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(area);

        let owned = self.owned_city_ids();
        let city_items: Vec<ListItem> = catalog::cities()
            .map(|def| self.market_city_item(def, owned.iter().any(|id| id == def.city_id)))
            .collect();
        let plane_items: Vec<ListItem> = catalog::planes()
            .map(|def| self.market_plane_item(def))
            .collect();

        self.render_list(
            frame,
            columns[0],
            "Cities for sale (Enter to buy)",
            city_items,
            self.market_city_cursor,
            self.market_focus == MarketFocus::Cities,
        );
        self.render_list(
            frame,
            columns[1],
            "Planes for sale (Enter to buy)",
            plane_items,
            self.market_plane_cursor,
            self.market_focus == MarketFocus::Planes,
        );
    }

    fn market_city_item(&self, def: &CityDef, owned: bool) -> ListItem<'static> {
        let marker = if owned {
            Span::styled("✔ ", Style::default().fg(self.theme.success))
        } else {
            Span::raw("  ")
        };
        ListItem::new(Line::from(vec![
            marker,
            Span::styled(
                format!("{:<12}", def.name),
                Style::default()
                    .fg(self.theme.primary_fg)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!(" {:>6}  class {}  pop {}", def.cost, def.city_class, def.population),
                Style::default().fg(self.theme.muted),
            ),
        ]))
    }

    fn market_plane_item(&self, def: &PlaneDef) -> ListItem<'static> {
        ListItem::new(Line::from(vec![
            Span::styled(
                format!("{:<17}", def.name),
                Style::default()
                    .fg(self.theme.primary_fg)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!(
                    " {:>6}  {}x{}  {} km/h  {} km",
                    def.cost, def.capacity, def.capacity_type, def.speed, def.flight_range
                ),
                Style::default().fg(self.theme.muted),
            ),
        ]))
    }

    fn render_cities(&self, frame: &mut Frame, area: Rect) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
            .split(area);

        let cities: Vec<ListItem> = self
            .player
            .as_ref()
            .map(|player| {
                player
                    .cities
                    .values()
                    .map(|city| {
                        let parked = player
                            .planes
                            .values()
                            .filter(|plane| {
                                plane.is_grounded() && plane.current_city_id == city.city_id
                            })
                            .count();
                        ListItem::new(Line::from(vec![
                            Span::styled(
                                format!("{:<12}", city.name),
                                Style::default().fg(self.theme.primary_fg),
                            ),
                            Span::styled(
                                format!(" {parked} parked"),
                                Style::default().fg(self.theme.muted),
                            ),
                        ]))
                    })
                    .collect()
            })
            .unwrap_or_default();
        self.render_list(
            frame,
            columns[0],
            "Owned cities (Enter: jobs)",
            cities,
            self.city_cursor,
            self.city_focus == CityFocus::Cities,
        );

        let Some(board) = self.board.as_ref() else {
            let hint = Paragraph::new("Open a city to see its job board.")
                .block(Block::default().borders(Borders::ALL).title("Jobs"))
                .style(Style::default().fg(self.theme.muted));
            frame.render_widget(hint, columns[1]);
            return;
        };

        let remaining = (board.jobs_expire - self.now()).max(0);
        let title = format!(
            "Jobs at {} · refresh in {}s · {} selected (Space select, l load)",
            city_name(&board.city_id),
            remaining,
            board.selected.len()
        );
        let items: Vec<ListItem> = board
            .jobs
            .iter()
            .map(|job| {
                let chosen = board.selected.contains(&job.id);
                let marker = if chosen {
                    Span::styled("● ", Style::default().fg(self.theme.success))
                } else {
                    Span::raw("○ ")
                };
                ListItem::new(Line::from(vec![
                    marker,
                    Span::styled(
                        format!("{} ", job.job_type),
                        Style::default().fg(self.theme.warning),
                    ),
                    Span::styled(
                        format!("→ {:<12}", city_name(&job.destination_city_id)),
                        Style::default().fg(self.theme.primary_fg),
                    ),
                    Span::styled(
                        format!(" {:>5}  {}", job.revenue, short_id(&job.id)),
                        Style::default().fg(self.theme.muted),
                    ),
                ]))
            })
            .collect();
        self.render_list(
            frame,
            columns[1],
            &title,
            items,
            board.cursor,
            self.city_focus == CityFocus::Jobs,
        );
    }

    fn render_planes(&self, frame: &mut Frame, area: Rect) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
            .split(area);

        let now = self.now();
        let planes: Vec<(String, PlaneState)> = self
            .player
            .as_ref()
            .map(|player| {
                player
                    .planes
                    .iter()
                    .map(|(id, plane)| (id.clone(), plane.clone()))
                    .collect()
            })
            .unwrap_or_default();
        let items: Vec<ListItem> = planes
            .iter()
            .map(|(id, plane)| {
                let (state, color) = match &plane.destination_city_id {
                    None => (
                        format!("at {}", city_name(&plane.current_city_id)),
                        self.theme.success,
                    ),
                    Some(destination) if plane.eta <= now => (
                        format!("landed at {} (a to settle)", city_name(destination)),
                        self.theme.warning,
                    ),
                    Some(destination) => (
                        format!("→ {} in {}s", city_name(destination), plane.eta - now),
                        self.theme.accent,
                    ),
                };
                ListItem::new(Line::from(vec![
                    Span::styled(
                        format!("{:<17}", plane.name),
                        Style::default().fg(self.theme.primary_fg),
                    ),
                    Span::styled(state, Style::default().fg(color)),
                ]))
            })
            .collect();
        self.render_list(
            frame,
            columns[0],
            "Fleet (d depart, a arrive)",
            items,
            self.plane_cursor,
            true,
        );

        let detail = match planes.get(self.plane_cursor) {
            Some((id, plane)) => plane_detail(id, plane),
            None => vec![Line::from("No planes yet. Buy one in the Market tab.")],
        };
        let paragraph = Paragraph::new(detail)
            .block(Block::default().borders(Borders::ALL).title("Plane"))
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, columns[1]);
    }

    fn render_list(
        &self,
        frame: &mut Frame,
        area: Rect,
        title: &str,
        items: Vec<ListItem>,
        cursor: usize,
        focused: bool,
    ) {
        let mut list_state = ListState::default();
        if !items.is_empty() {
            list_state.select(Some(cursor.min(items.len() - 1)));
        }
        let border = if focused {
            Style::default().fg(self.theme.accent)
        } else {
            Style::default().fg(self.theme.muted)
        };
        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(border)
                    .title(title.to_string()),
            )
            .highlight_style(Style::default().bg(self.theme.selection_bg));
        frame.render_stateful_widget(list, area, &mut list_state);
    }

    fn render_modal(&self, frame: &mut Frame, modal: &Modal) {
        let (title, options, cursor): (&str, Vec<String>, usize) = match modal {
            Modal::StartCity {
                options, cursor, ..
            } => (
                "Starting city",
                options.iter().map(|id| city_name(id)).collect(),
                *cursor,
            ),
            Modal::LoadPlane { options, cursor } => (
                "Plane to load",
                options
                    .iter()
                    .map(|id| {
                        self.plane(id)
                            .map(|plane| {
                                format!(
                                    "{} {} ({} free)",
                                    plane.name,
                                    short_id(id),
                                    plane.free_capacity()
                                )
                            })
                            .unwrap_or_else(|| id.clone())
                    })
                    .collect(),
                *cursor,
            ),
            Modal::Destination {
                options, cursor, ..
            } => (
                "Destination",
                options.iter().map(|id| city_name(id)).collect(),
                *cursor,
            ),
        };

        let height = (options.len() as u16 + 2).min(frame.size().height);
        let area = centered_rect(40, height, frame.size());
        frame.render_widget(Clear, area);
        let items: Vec<ListItem> = options.into_iter().map(ListItem::new).collect();
        self.render_list(frame, area, title, items, cursor, true);
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        let color = if self.status_is_error {
            self.theme.danger
        } else {
            self.theme.primary_fg
        };
        let updated = Local
            .timestamp_opt(self.now(), 0)
            .single()
            .map(|time| time.format("%H:%M:%S").to_string())
            .unwrap_or_default();
        let paragraph = Paragraph::new(vec![
            Line::from(Span::styled(self.status.clone(), Style::default().fg(color))),
            Line::from(Span::styled(
                format!("{updated}  Tab switch · arrows move · r refresh · q quit"),
                Style::default().fg(self.theme.muted),
            )),
        ])
        .block(Block::default().borders(Borders::ALL).title("Status"))
        .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }
}

fn plane_detail(plane_id: &str, plane: &PlaneState) -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::from(format!("{} ({})", plane.name, plane_id)),
        Line::from(format!(
            "Carries {} · {}/{} loaded · {} km/h · range {} km",
            plane.capacity_type,
            plane.loaded_jobs.len(),
            plane.capacity,
            plane.speed,
            plane.flight_range
        )),
        Line::from(""),
    ];
    if plane.loaded_jobs.is_empty() {
        lines.push(Line::from("Hold is empty."));
    }
    for job in plane.loaded_jobs.values() {
        lines.push(Line::from(format!(
            "{} → {}  {}",
            job.job_type,
            city_name(&job.destination_city_id),
            job.revenue
        )));
    }
    lines
}

fn city_name(city_id: &str) -> String {
    catalog::city(city_id)
        .map(|def| def.name.to_string())
        .unwrap_or_else(|| city_id.to_string())
}

fn plane_name(plane_def: &str) -> String {
    catalog::plane(plane_def)
        .map(|def| def.name.to_string())
        .unwrap_or_else(|| plane_def.to_string())
}

fn short_id(id: &str) -> &str {
    id.get(..6).unwrap_or(id)
}

fn step(cursor: usize, delta: isize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let next = cursor as isize + delta;
    next.clamp(0, len as isize - 1) as usize
}

fn centered_rect(width_percent: u16, height: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(height),
            Constraint::Min(0),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - width_percent) / 2),
            Constraint::Percentage(width_percent),
            Constraint::Percentage((100 - width_percent) / 2),
        ])
        .split(vertical[1])[1]
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor()?;
    Ok(())
}

fn spawn_input_thread(sender: mpsc::Sender<AppEvent>) {
    thread::spawn(move || loop {
        match event::poll(TICK_RATE) {
            Ok(true) => match event::read() {
                Ok(evt) => {
                    if sender.blocking_send(AppEvent::Input(evt)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            },
            Ok(false) => {
                if sender.blocking_send(AppEvent::Tick).is_err() {
                    break;
                }
            }
            Err(_) => break,
        }
    });
}
