//! Line-oriented front end. Each protected command revalidates the session
//! first, the way a screen does when it gains focus.

use crate::app::AppContext;
use crate::controllers::appointments::{
    self, AppointmentDraft, AppointmentEdit, Confirm, DateFilter, ScheduledAppointment,
};
use crate::controllers::files::{self, Upload};
use crate::controllers::messaging::{ChatScreen, ChatView, InboxScreen, InboxView};
use crate::controllers::metrics::{self, MetricsScreen, MetricsView, TimeWindow};
use crate::controllers::notifications::{self, NotificationsScreen, NotificationsView};
use crate::controllers::patients;
use crate::controllers::registration::{self, RegistrationForm};
use crate::controllers::reports::{self, ReportSummary, Stat};
use crate::controllers::{login, lookup_user};
use crate::error::{AppError, AppResult};
use crate::models::{Appointment, Gender, Role, Session};
use crate::session::{SessionValidator, Validation};
use crate::storage::{collections, fetch};
use chrono::{Local, NaiveDate};
use log::error;
use std::cell::RefCell;
use std::fmt::Display;
use std::io::{BufRead, Write};

const HELP: &str = "\
Commands:
  register <first> <surname> <email> <password> <confirm> <dd/mm/yyyy> [male|female|other] [patient|doctor]
  login <patient|doctor> <email> <password>
  logout | whoami
  appointments [all|today|week]      calendar <dd/mm/yyyy>
  appointment new <patientId> <dd/mm/yyyy> <time> <address...>
  appointment confirm|delete <id>
  link <doctor email>                doctors
  patients [search]                  contacts
  inbox [search]                     chat <userId>
  send <userId> <text...>
  metrics [30m|1h|24h]               export [30m|1h|24h]
  reports <patientId> <dd/mm/yyyy>
  notifications [1-5|all] [search]   read <notificationId>
  files <patientId>                  upload <patientId> <path>
  exit";

enum Flow {
    Continue,
    Exit,
}

fn parse_window(arg: Option<&str>) -> TimeWindow {
    arg.and_then(TimeWindow::parse).unwrap_or_default()
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub struct Console<R, W> {
    ctx: AppContext,
    input: RefCell<R>,
    output: RefCell<W>,
}

impl<R: BufRead, W: Write> Confirm for Console<R, W> {
    fn confirm(&self, title: &str, message: &str) -> bool {
        self.prompt(&format!("{}: {} [y/N] ", title, message));
        matches!(
            self.read_line().as_deref().map(str::to_lowercase).as_deref(),
            Some("y" | "yes")
        )
    }
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(ctx: AppContext, input: R, output: W) -> Self {
        Console {
            ctx,
            input: RefCell::new(input),
            output: RefCell::new(output),
        }
    }

    pub fn into_output(self) -> W {
        self.output.into_inner()
    }

    fn say(&self, text: impl Display) {
        if let Err(e) = writeln!(self.output.borrow_mut(), "{}", text) {
            error!("[Console] Write failed: {}", e);
        }
    }

    fn prompt(&self, text: &str) {
        let mut output = self.output.borrow_mut();
        if let Err(e) = write!(output, "{}", text).and_then(|_| output.flush()) {
            error!("[Console] Write failed: {}", e);
        }
    }

    /// Next trimmed input line; `None` at end of input.
    fn read_line(&self) -> Option<String> {
        let mut line = String::new();
        match self.input.borrow_mut().read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(line.trim().to_string()),
            Err(e) => {
                error!("[Console] Read failed: {}", e);
                None
            }
        }
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        self.say("ClearConnect console. Type `help` for commands.");
        loop {
            self.prompt("> ");
            let Some(line) = self.read_line() else {
                break;
            };
            if line.is_empty() {
                continue;
            }
            match self.dispatch(&line).await {
                Ok(Flow::Exit) => break,
                Ok(Flow::Continue) => {}
                Err(e) => self.report(&e),
            }
        }
        self.say("Goodbye.");
        Ok(())
    }

    fn report(&self, e: &AppError) {
        match e.alert() {
            Some(alert) => self.say(format!("{}: {}", alert.title, alert.message)),
            None => {
                error!("[Console] {}", e);
                if !matches!(e, AppError::SessionInvalid) {
                    self.say("Error: Something went wrong.");
                }
            }
        }
    }

    fn expired(&self) -> AppError {
        self.say("Session expired or invalid. Please log in again.");
        AppError::SessionInvalid
    }

    /// Focus check for commands without a live query.
    async fn protected(&self) -> AppResult<Session> {
        let validator = SessionValidator::new(self.ctx.sessions.clone());
        if validator.validate().await != Validation::Valid {
            return Err(self.expired());
        }
        self.ctx.sessions.require()
    }

    async fn protected_as(&self, role: Role) -> AppResult<Option<Session>> {
        let session = self.protected().await?;
        if session.role != role {
            self.say(format!("Only {}s can do that.", role));
            return Ok(None);
        }
        Ok(Some(session))
    }

    /// Doctors reach any patient's records; patients only their own.
    async fn protected_records(&self, patient_id: &str) -> AppResult<Option<Session>> {
        let session = self.protected().await?;
        if session.role == Role::Patient && session.subject_id != patient_id {
            self.say("You can only access your own records.");
            return Ok(None);
        }
        Ok(Some(session))
    }

    async fn dispatch(&self, line: &str) -> AppResult<Flow> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let args = &parts[1..];
        match parts[0].to_lowercase().as_str() {
            "exit" | "quit" => return Ok(Flow::Exit),
            "help" => self.say(HELP),
            "register" => self.register(args).await?,
            "login" => self.login(args).await?,
            "logout" => {
                self.ctx.sessions.logout().await;
                self.say("Logged out.");
            }
            "whoami" => match self.ctx.sessions.current() {
                Some(s) => self.say(format!(
                    "{} {} <{}> ({})",
                    s.profile.firstname, s.profile.surname, s.profile.email, s.role
                )),
                None => self.say("Not signed in."),
            },
            "appointments" => self.appointments(args.first().copied()).await?,
            "calendar" => self.calendar(args).await?,
            "appointment" => self.appointment(args).await?,
            "link" => self.link(args).await?,
            "doctors" => self.doctors().await?,
            "patients" => self.patients(&args.join(" ")).await?,
            "contacts" => self.contacts().await?,
            "inbox" => self.inbox(&args.join(" ")).await?,
            "chat" => self.chat(args).await?,
            "send" => self.send(args).await?,
            "metrics" => self.metrics(parse_window(args.first().copied())).await?,
            "export" => self.export(parse_window(args.first().copied())).await?,
            "reports" => self.reports(args).await?,
            "notifications" => self.notifications(args).await?,
            "read" => self.read_notification(args).await?,
            "files" => self.files(args).await?,
            "upload" => self.upload(args).await?,
            other => self.say(format!("Unknown command `{}`. Type `help`.", other)),
        }
        Ok(Flow::Continue)
    }

    async fn register(&self, args: &[&str]) -> AppResult<()> {
        let field = |i: usize| args.get(i).map(|s| s.to_string()).unwrap_or_default();
        let gender = match args.get(6).copied() {
            Some("female") => Gender::Female,
            Some("other") => Gender::Other,
            _ => Gender::Male,
        };
        let role = match args.get(7).copied() {
            Some("doctor") => Role::Doctor,
            _ => Role::Patient,
        };
        let form = RegistrationForm {
            firstname: field(0),
            surname: field(1),
            email: field(2),
            password: field(3),
            confirm_password: field(4),
            dob: args.get(5).and_then(|d| appointments::parse_date(d)),
            gender,
            role,
        };
        self.say(format!(
            "Password strength: {:?}",
            registration::password_strength(&form.password)
        ));
        registration::register(&self.ctx, &form).await?;
        self.say("Success: Registration successful!");
        Ok(())
    }

    async fn login(&self, args: &[&str]) -> AppResult<()> {
        let (email, password) = (
            args.get(1).copied().unwrap_or_default(),
            args.get(2).copied().unwrap_or_default(),
        );
        let outcome = match args.first().copied() {
            Some("doctor") => login::login_doctor(&self.ctx, email, password).await?,
            Some("patient") => login::login_patient(&self.ctx, email, password).await?,
            _ => {
                self.say("Usage: login <patient|doctor> <email> <password>");
                return Ok(());
            }
        };
        self.say(format!("{}: {}", outcome.welcome.title, outcome.welcome.message));
        Ok(())
    }

    fn print_appointments(&self, list: &[ScheduledAppointment]) {
        if list.is_empty() {
            self.say("No appointments.");
        }
        for item in list {
            let appt = &item.appointment;
            self.say(format!(
                "[{}] {} at {} with {} | {} | {} | {}",
                appt.id,
                appt.date,
                appt.time,
                item.counterpart,
                if appt.address.is_empty() { "Not provided" } else { &appt.address },
                if appt.reason.is_empty() { "No reason given" } else { &appt.reason },
                item.status_label()
            ));
        }
    }

    async fn appointments(&self, filter: Option<&str>) -> AppResult<()> {
        let session = self.protected().await?;
        let list = match session.role {
            Role::Doctor => {
                let filter = match filter {
                    Some("today") => DateFilter::Today,
                    Some("week") => DateFilter::Week,
                    _ => DateFilter::All,
                };
                let all = appointments::doctor_appointments(&self.ctx, &session.subject_id).await?;
                appointments::filter_and_sort(&all, filter, today())
            }
            Role::Patient => {
                appointments::upcoming_for_patient(&self.ctx, &session.subject_id, today()).await?
            }
        };
        self.print_appointments(&list);
        Ok(())
    }

    async fn calendar(&self, args: &[&str]) -> AppResult<()> {
        let Some(session) = self.protected_as(Role::Doctor).await? else {
            return Ok(());
        };
        let all = appointments::doctor_appointments(&self.ctx, &session.subject_id).await?;
        let marked: Vec<String> = appointments::marked_dates(&all)
            .iter()
            .map(|d| d.format("%d/%m/%Y").to_string())
            .collect();
        self.say(format!("Marked dates: {}", marked.join(", ")));
        if let Some(date) = args.first().and_then(|d| appointments::parse_date(d)) {
            self.print_appointments(&appointments::on_date(&all, date));
        }
        Ok(())
    }

    async fn appointment(&self, args: &[&str]) -> AppResult<()> {
        let Some(session) = self.protected_as(Role::Doctor).await? else {
            return Ok(());
        };
        match args {
            ["new", patient_id, date, time, address @ ..] => {
                let draft = AppointmentDraft {
                    patient_id: patient_id.to_string(),
                    date: date.to_string(),
                    time: time.to_string(),
                    address: address.join(" "),
                    ..AppointmentDraft::default()
                };
                let id = appointments::create_appointment(&self.ctx, &session.subject_id, &draft).await?;
                self.say(format!("Success: Appointment created ({}).", id));
            }
            ["confirm", id] => {
                let Some(appt) = fetch::<Appointment>(self.ctx.store(), collections::APPOINTMENTS, id).await? else {
                    self.say("Appointment not found.");
                    return Ok(());
                };
                let mut edit = AppointmentEdit::from(&appt);
                edit.confirmed = true;
                appointments::update_appointment(&self.ctx, id, &edit).await?;
                self.say("Success: Appointment updated.");
            }
            ["delete", id] => {
                if appointments::delete_appointment(&self.ctx, id, self).await? {
                    self.say("Deleted: Appointment deleted.");
                } else {
                    self.say("Cancelled.");
                }
            }
            _ => self.say("Usage: appointment new|confirm|delete ..."),
        }
        Ok(())
    }

    async fn link(&self, args: &[&str]) -> AppResult<()> {
        let Some(session) = self.protected_as(Role::Patient).await? else {
            return Ok(());
        };
        let doctor = patients::link_doctor(&self.ctx, &session.subject_id, &args.join(" ")).await?;
        self.say(format!(
            "Success: You have successfully linked to Dr. {}.",
            doctor.full_name()
        ));
        Ok(())
    }

    async fn doctors(&self) -> AppResult<()> {
        let Some(session) = self.protected_as(Role::Patient).await? else {
            return Ok(());
        };
        for doctor in patients::linked_doctors(&self.ctx, &session.subject_id).await? {
            self.say(format!("[{}] Dr. {} <{}>", doctor.id, doctor.full_name(), doctor.email));
        }
        Ok(())
    }

    async fn patients(&self, term: &str) -> AppResult<()> {
        let Some(session) = self.protected_as(Role::Doctor).await? else {
            return Ok(());
        };
        let list = patients::linked_patients(&self.ctx, &session.subject_id, today()).await?;
        for patient in patients::search_patients(&list, term) {
            let age = patient.age.map_or("Unknown".to_string(), |a| a.to_string());
            self.say(format!("[{}] {} (age {})", patient.id, patient.name, age));
        }
        Ok(())
    }

    async fn contacts(&self) -> AppResult<()> {
        let session = self.protected().await?;
        for contact in patients::contacts(&self.ctx, &session, today()).await? {
            self.say(format!("[{}] {}", contact.id, contact.name));
        }
        Ok(())
    }

    async fn inbox(&self, term: &str) -> AppResult<()> {
        let mut screen = InboxScreen::mount(&self.ctx, InboxView::new(&self.ctx));
        if screen.focus().await? != Validation::Valid {
            return Err(self.expired());
        }
        let view = screen.view();
        if view.conversations().is_empty() {
            self.say("No conversations.");
        }
        for c in view.search(term) {
            self.say(format!(
                "{} {} [{}]: {}",
                if c.unread { "*" } else { " " },
                c.partner_name,
                c.partner_id,
                c.last_text
            ));
        }
        Ok(())
    }

    async fn chat(&self, args: &[&str]) -> AppResult<()> {
        let Some(partner_id) = args.first() else {
            self.say("Usage: chat <userId>");
            return Ok(());
        };
        let name = lookup_user(self.ctx.store(), partner_id)
            .await
            .map(|u| u.full_name())
            .unwrap_or_else(|| "Unknown".to_string());
        let mut screen = ChatScreen::mount(&self.ctx, ChatView::new(&self.ctx, partner_id, &name));
        if screen.focus().await? != Validation::Valid {
            return Err(self.expired());
        }
        let me = self.ctx.sessions.require()?.subject_id;
        self.say(format!("Chat with {}", screen.view().partner_name()));
        for m in screen.view().messages() {
            let who = if m.sender_id == me { "me" } else { name.as_str() };
            self.say(format!("  {}: {}", who, m.text));
        }
        screen.unmount();
        Ok(())
    }

    async fn send(&self, args: &[&str]) -> AppResult<()> {
        let session = self.protected().await?;
        let Some((partner_id, words)) = args.split_first() else {
            self.say("Usage: send <userId> <text...>");
            return Ok(());
        };
        let view = ChatView::new(&self.ctx, partner_id, "");
        if view.send(&session, &words.join(" ")).await? {
            self.say("Sent.");
        }
        Ok(())
    }

    async fn metrics(&self, window: TimeWindow) -> AppResult<()> {
        let mut screen = MetricsScreen::mount(&self.ctx, MetricsView::new(window));
        if screen.focus().await? != Validation::Valid {
            return Err(self.expired());
        }
        let view = screen.view();
        self.say(format!("Window: {}", view.window().label()));
        self.say(format!("Current Heart Rate: {} bpm", view.current_heart_rate()));
        self.say(format!("Current SpO2: {}%", view.current_spo2()));
        for (label, series) in [("Heart rate", view.heart_rate()), ("SpO2", view.spo2())] {
            if metrics::is_chartable(series) {
                self.say(format!("{}: {:?}", label, metrics::chart_points(series)));
            } else {
                self.say(format!("{}: no chart data", label));
            }
        }
        Ok(())
    }

    async fn export(&self, window: TimeWindow) -> AppResult<()> {
        let Some(session) = self.protected_as(Role::Patient).await? else {
            return Ok(());
        };
        metrics::export_report(&self.ctx, &session.subject_id, window).await?;
        self.say("Success: Readings exported for doctor review.");
        Ok(())
    }

    async fn reports(&self, args: &[&str]) -> AppResult<()> {
        let (Some(patient_id), Some(day)) = (
            args.first(),
            args.get(1).and_then(|d| appointments::parse_date(d)),
        ) else {
            self.protected().await?;
            self.say("Usage: reports <patientId> <dd/mm/yyyy>");
            return Ok(());
        };
        if self.protected_records(patient_id).await?.is_none() {
            return Ok(());
        }
        let list = reports::reports_for_day(&self.ctx, patient_id, day).await?;
        if list.is_empty() {
            self.say("No reports for this day.");
        }
        for report in &list {
            let s = ReportSummary::of(report);
            self.say(format!(
                "[{}] {}{}\n  BPM avg {} median {} peak {} trough {}\n  SpO2 avg {} median {} peak {} trough {}",
                s.report_id,
                s.time_range,
                if s.irregular { " (irregular values)" } else { "" },
                Stat(s.bpm.average),
                Stat(s.bpm.median),
                Stat(s.bpm.peak),
                Stat(s.bpm.trough),
                Stat(s.o2.average),
                Stat(s.o2.median),
                Stat(s.o2.peak),
                Stat(s.o2.trough),
            ));
        }
        Ok(())
    }

    async fn notifications(&self, args: &[&str]) -> AppResult<()> {
        let mut screen = NotificationsScreen::mount(&self.ctx, NotificationsView::new());
        if screen.focus().await? != Validation::Valid {
            return Err(self.expired());
        }
        let priority = args
            .first()
            .and_then(|p| p.parse::<u8>().ok())
            .filter(|level| notifications::PRIORITY_LEVELS.contains(level));
        let skip = usize::from(args.first().is_some_and(|p| priority.is_some() || *p == "all"));
        let term = args.get(skip..).map(|rest| rest.join(" ")).unwrap_or_default();
        for n in screen.view().filtered(priority, &term) {
            self.say(format!(
                "{} [{}] (P{}) {}",
                if n.read { " " } else { "*" },
                n.id,
                n.priority,
                n.message
            ));
        }
        Ok(())
    }

    async fn read_notification(&self, args: &[&str]) -> AppResult<()> {
        self.protected().await?;
        match args.first() {
            Some(id) => notifications::mark_read(&self.ctx, id).await,
            None => self.say("Usage: read <notificationId>"),
        }
        Ok(())
    }

    async fn files(&self, args: &[&str]) -> AppResult<()> {
        let patient_id = args.first().copied().unwrap_or_default();
        if self.protected_records(patient_id).await?.is_none() {
            return Ok(());
        }
        for file in files::list_files(&self.ctx, patient_id).await? {
            let kind = if file.is_pdf() { "PDF" } else { "image" };
            self.say(format!("{} ({}) {}", file.file_name, kind, file.file_url));
        }
        Ok(())
    }

    async fn upload(&self, args: &[&str]) -> AppResult<()> {
        let [patient_id, path] = args else {
            self.protected().await?;
            self.say("Usage: upload <patientId> <path>");
            return Ok(());
        };
        if self.protected_records(patient_id).await?.is_none() {
            return Ok(());
        }
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to read {}: {}", path, e)))?;
        let upload = if path.to_lowercase().ends_with(".pdf") {
            let name = std::path::Path::new(path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned());
            Upload::Pdf { name, bytes }
        } else {
            Upload::Image(bytes)
        };
        let file = files::upload_file(&self.ctx, patient_id, upload).await?;
        self.say(format!("Success: File uploaded successfully! ({})", file.file_name));
        Ok(())
    }
}
