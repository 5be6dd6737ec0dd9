use crate::config::StyleboxConfig;
use crate::document::Document;
use crate::event::AppEvent;
use crate::host::stream::{ScriptedStreamer, DEMO_REPLY, DEMO_SWIPE};
use crate::host::{self, HostChat, Role};
use crate::render::notify::{HostSignal, Located, NotificationAdapter, ScanRequest};
use crate::render::Pipeline;
use crate::schedule::Scheduler;
use crate::template::registry::LoadRejection;
use crate::template::{Template, TemplateDefinition};
use crate::theme::Theme;
use eframe::egui::{self, RichText, ScrollArea};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

#[derive(Default)]
struct TemplateEditor {
    identifier: String,
    markup_pattern: String,
    style_rules: String,
    status: Option<(String, bool)>,
}

impl TemplateEditor {
    fn load(&mut self, template: &Template) {
        self.identifier = template.identifier.clone();
        self.markup_pattern = template.markup_pattern().to_string();
        self.style_rules = template.style_rules().unwrap_or_default().to_string();
        self.status = None;
    }

    fn definition(&self) -> TemplateDefinition {
        TemplateDefinition::new(self.markup_pattern.clone()).with_style_rules(self.style_rules.clone())
    }
}

pub struct StyleboxApp {
    rx: Receiver<AppEvent>,
    scheduler: Scheduler,
    streamer: ScriptedStreamer,
    config: StyleboxConfig,
    notify: NotificationAdapter,
    pipeline: Pipeline,
    document: Document,
    chat: HostChat,
    theme: Theme,
    active_stream: Option<u64>,
    input_buffer: String,
    editing_message: Option<usize>,
    editor: TemplateEditor,
    diagnostics_log: Vec<String>,
    scroll_to_bottom: bool,
}

impl StyleboxApp {
    pub fn new(
        rx: Receiver<AppEvent>,
        scheduler: Scheduler,
        config: StyleboxConfig,
        pipeline: Pipeline,
        rejections: Vec<LoadRejection>,
    ) -> Self {
        let mut document = Document::new();
        let chat = HostChat::mount(&mut document);
        let streamer = ScriptedStreamer::new(
            scheduler.clone(),
            config.stream_chunk_chars,
            config.stream_interval(),
        );
        let mut app = Self {
            rx,
            scheduler,
            streamer,
            notify: NotificationAdapter::from_config(&config),
            config,
            pipeline,
            document,
            chat,
            theme: Theme::default(),
            active_stream: None,
            input_buffer: String::new(),
            editing_message: None,
            editor: TemplateEditor::default(),
            diagnostics_log: Vec::new(),
            scroll_to_bottom: false,
        };

        for rejection in rejections {
            app.log_diagnostic(format!(
                "stored template {} ignored: {}",
                rejection.identifier, rejection.error
            ));
        }
        app.dispatch(vec![HostSignal::Startup]);
        app
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    fn timestamp() -> String {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(duration) => duration.as_secs().to_string(),
            Err(_) => "0".to_string(),
        }
    }

    fn log_diagnostic(&mut self, message: impl Into<String>) {
        self.diagnostics_log
            .push(format!("[{}] {}", Self::timestamp(), message.into()));
    }

    fn dispatch(&mut self, signals: Vec<HostSignal>) {
        for signal in signals {
            if let Some(scheduled) = self.notify.plan(signal) {
                debug!(?signal, region = %scheduled.request.region, "scan scheduled");
                self.scheduler
                    .after(scheduled.delay, AppEvent::Scan(scheduled.request));
            }
        }
    }

    fn run_scan(&mut self, request: ScanRequest) {
        match self.notify.locate(&self.document, request) {
            Located::Root(root) => {
                let report = self.pipeline.reconcile(&mut self.document, root);
                if report.changed_anything() {
                    self.log_diagnostic(format!(
                        "{}: {} rendered, {} re-rendered, {} pruned",
                        request.region, report.rendered, report.rerendered, report.pruned
                    ));
                }
            }
            Located::Retry(scheduled) => {
                self.scheduler
                    .after(scheduled.delay, AppEvent::Scan(scheduled.request));
            }
            Located::Gone => {
                self.log_diagnostic(format!("{} never appeared, scan dropped", request.region));
            }
        }
    }

    fn rerender_everything(&mut self) {
        let body = self.document.body();
        self.pipeline.reconcile(&mut self.document, body);
    }

    fn schedule_flush(&self, ticket: u64) {
        self.scheduler
            .after(self.config.save_debounce(), AppEvent::FlushTemplates { ticket });
    }

    fn save_template(&mut self) {
        let identifier = self.editor.identifier.trim().to_string();
        let definition = self.editor.definition();
        match self
            .pipeline
            .register_template(&mut self.document, &identifier, definition)
        {
            Ok(ticket) => {
                self.schedule_flush(ticket);
                self.rerender_everything();
                self.editor.status = Some((format!("Saved {identifier}"), false));
                self.log_diagnostic(format!("template registered: {identifier}"));
            }
            Err(err) => {
                self.editor.status = Some((err.to_string(), true));
            }
        }
    }

    fn delete_template(&mut self) {
        let identifier = self.editor.identifier.trim().to_string();
        match self
            .pipeline
            .unregister_template(&mut self.document, &identifier)
        {
            Ok(Some(ticket)) => {
                self.schedule_flush(ticket);
                self.editor = TemplateEditor::default();
                self.editor.status = Some((format!("Deleted {identifier}"), false));
                self.log_diagnostic(format!("template removed: {identifier}"));
            }
            Ok(None) => {
                self.editor.status = Some((format!("No template named {identifier}"), true));
            }
            Err(err) => {
                self.editor.status = Some((err.to_string(), true));
            }
        }
    }

    fn start_stream(&mut self, text: &str) {
        if self.active_stream.take().is_some() {
            let signals = self.chat.stop_stream(&mut self.document);
            self.dispatch(signals);
        }
        let signals = self.chat.begin_stream(&mut self.document);
        self.dispatch(signals);
        self.active_stream = Some(self.streamer.stream(text));
        self.scroll_to_bottom = true;
    }

    fn stop_stream(&mut self) {
        if self.active_stream.take().is_some() {
            let signals = self.chat.stop_stream(&mut self.document);
            self.dispatch(signals);
            self.log_diagnostic("generation stopped");
        }
    }

    fn submit(&mut self, role: Role, ctx: &egui::Context) {
        let text = self.input_buffer.trim().to_string();
        if text.is_empty() {
            return;
        }

        if let Some(index) = self.editing_message.take() {
            let signals = self.chat.edit_message(&mut self.document, index, &text);
            self.dispatch(signals);
        } else {
            match role {
                Role::User => {
                    let signals = self.chat.push_message(&mut self.document, Role::User, &text);
                    self.dispatch(signals);
                }
                Role::Character => self.start_stream(&text),
            }
        }

        self.input_buffer.clear();
        self.scroll_to_bottom = true;
        ctx.request_repaint();
    }

    fn drain_events(&mut self, ctx: &egui::Context) {
        loop {
            match self.rx.try_recv() {
                Ok(event) => self.apply_event(event, ctx),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.log_diagnostic("event channel disconnected");
                    break;
                }
            }
        }
    }

    fn apply_event(&mut self, event: AppEvent, ctx: &egui::Context) {
        match event {
            AppEvent::StreamDelta { stream, text } => {
                if self.active_stream != Some(stream) {
                    return;
                }
                let signals = self.chat.append_stream(&mut self.document, &text);
                self.dispatch(signals);
                self.scroll_to_bottom = true;
                ctx.request_repaint();
            }
            AppEvent::StreamEnd { stream } => {
                if self.active_stream != Some(stream) {
                    return;
                }
                self.active_stream = None;
                let signals = self.chat.finish_stream(&mut self.document);
                self.dispatch(signals);
                ctx.request_repaint();
            }
            AppEvent::Scan(request) => {
                self.run_scan(request);
                ctx.request_repaint();
            }
            AppEvent::FlushTemplates { ticket } => {
                if self.pipeline.flush_templates(ticket) {
                    info!(ticket, "user templates saved");
                    self.log_diagnostic("user templates saved");
                }
            }
            AppEvent::Diagnostic(message) => self.log_diagnostic(message),
        }
    }

    fn render_top_bar(&mut self, ctx: &egui::Context) {
        let (status_label, status_color) = if self.active_stream.is_some() {
            ("Streaming", self.theme.warning)
        } else {
            ("Idle", self.theme.success)
        };
        let mode = format!("{:?}", self.pipeline.coordinator().mode()).to_lowercase();
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.strong("Stylebox");
                ui.separator();
                ui.label(RichText::new(status_label).color(status_color));
                ui.separator();
                ui.label(format!("{} templates", self.pipeline.registry().count()));
                ui.separator();
                ui.label(format!("mode: {mode}"));
                ui.separator();
                ui.label(format!("{} widgets", self.pipeline.coordinator().records().count()));
            });
        });
    }

    fn render_left_panel(&mut self, ctx: &egui::Context) {
        let templates: Vec<Arc<Template>> = self.pipeline.registry().all().collect();
        let card = self.theme.card_frame();
        let danger = self.theme.danger;
        let muted = self.theme.text_muted;

        egui::SidePanel::left("templates_panel")
            .resizable(true)
            .default_width(340.0)
            .show(ctx, |ui| {
                ui.heading("Templates");
                ui.separator();

                let mut selected: Option<Arc<Template>> = None;
                for template in &templates {
                    ui.horizontal(|ui| {
                        let active = template.identifier == self.editor.identifier;
                        if ui.selectable_label(active, &template.identifier).clicked() {
                            selected = Some(Arc::clone(template));
                        }
                        ui.label(RichText::new(template.origin.as_str()).color(muted).small());
                    });
                }
                if let Some(template) = selected {
                    self.editor.load(&template);
                }

                ui.separator();
                let mut save = false;
                let mut delete = false;
                card.show(ui, |ui| {
                    ui.strong("Editor");
                    ui.add(
                        egui::TextEdit::singleline(&mut self.editor.identifier)
                            .hint_text("Identifier"),
                    );
                    ScrollArea::vertical()
                        .id_salt("markup_editor")
                        .max_height(220.0)
                        .show(ui, |ui| {
                            ui.add(
                                egui::TextEdit::multiline(&mut self.editor.markup_pattern)
                                    .code_editor()
                                    .desired_rows(8)
                                    .hint_text("<b>field-ref(name, default)</b>"),
                            );
                        });
                    ScrollArea::vertical()
                        .id_salt("style_editor")
                        .max_height(140.0)
                        .show(ui, |ui| {
                            ui.add(
                                egui::TextEdit::multiline(&mut self.editor.style_rules)
                                    .code_editor()
                                    .desired_rows(4)
                                    .hint_text("Style rules"),
                            );
                        });
                    ui.horizontal(|ui| {
                        save = ui.button("Save").clicked();
                        delete = ui.button("Delete").clicked();
                        if ui.button("New").clicked() {
                            self.editor = TemplateEditor::default();
                        }
                    });
                    if let Some((message, is_error)) = &self.editor.status {
                        let color = if *is_error { danger } else { muted };
                        ui.label(RichText::new(message).color(color));
                    }
                });

                if save {
                    self.save_template();
                }
                if delete {
                    self.delete_template();
                }
            });
    }

    fn render_center_panel(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Chat");
            ui.separator();

            let mut edit: Option<usize> = None;
            let mut delete: Option<usize> = None;
            let mut swipe: Option<usize> = None;
            let transcript_height = (ui.available_height() - 260.0).max(120.0);
            ScrollArea::vertical()
                .id_salt("chat_transcript")
                .max_height(transcript_height)
                .stick_to_bottom(true)
                .show(ui, |ui| {
                    for index in 0..self.chat.len() {
                        let Some((role, _)) = self.chat.message(index) else {
                            continue;
                        };
                        let html = host::message_text(&self.document, index)
                            .map(|node| self.document.inner_html(node))
                            .unwrap_or_default();
                        self.theme.card_frame().show(ui, |ui| {
                            ui.horizontal(|ui| {
                                ui.strong(format!("[{}] #{index}", role.label()));
                                if ui.small_button("Edit").clicked() {
                                    edit = Some(index);
                                }
                                if role == Role::Character && ui.small_button("Swipe").clicked() {
                                    swipe = Some(index);
                                }
                                if ui.small_button("Delete").clicked() {
                                    delete = Some(index);
                                }
                            });
                            ui.label(RichText::new(html).monospace());
                        });
                    }

                    if self.scroll_to_bottom {
                        ui.scroll_to_cursor(Some(egui::Align::BOTTOM));
                    }
                });
            self.scroll_to_bottom = false;

            if let Some(index) = edit {
                if let Some((_, source)) = self.chat.message(index) {
                    self.input_buffer = source.to_string();
                    self.editing_message = Some(index);
                }
            }
            if let Some(index) = swipe {
                let signals = self.chat.swipe_message(&mut self.document, index, DEMO_SWIPE);
                self.dispatch(signals);
            }
            if let Some(index) = delete {
                if self.editing_message == Some(index) {
                    self.editing_message = None;
                }
                let signals = self.chat.delete_message(&mut self.document, index);
                self.dispatch(signals);
            }

            ui.separator();
            egui::CollapsingHeader::new("Document")
                .default_open(false)
                .show(ui, |ui| {
                    ScrollArea::vertical()
                        .id_salt("document_html")
                        .max_height(160.0)
                        .show(ui, |ui| {
                            let root = self.document.root();
                            ui.label(RichText::new(self.document.outer_html(root)).monospace());
                        });
                });
            egui::CollapsingHeader::new("Diagnostics")
                .default_open(false)
                .show(ui, |ui| {
                    ScrollArea::vertical()
                        .id_salt("diagnostics_log")
                        .max_height(90.0)
                        .stick_to_bottom(true)
                        .show(ui, |ui| {
                            for entry in &self.diagnostics_log {
                                ui.label(entry);
                            }
                        });
                });

            ui.separator();
            let streaming = self.active_stream.is_some();
            let hint = match self.editing_message {
                Some(_) => "Edit the message...",
                None => "Type a message, fenced code blocks included...",
            };
            self.theme.composer_frame().show(ui, |ui| {
                ui.add(
                    egui::TextEdit::multiline(&mut self.input_buffer)
                        .desired_width(f32::INFINITY)
                        .desired_rows(4)
                        .hint_text(hint),
                );
            });

            let has_text = !self.input_buffer.trim().is_empty();
            let mut action: Option<Role> = None;
            ui.horizontal(|ui| {
                if let Some(index) = self.editing_message {
                    if ui.add_enabled(has_text, egui::Button::new("Apply edit")).clicked() {
                        action = Some(Role::User);
                    }
                    if ui.button("Cancel").clicked() {
                        self.editing_message = None;
                        self.input_buffer.clear();
                    }
                    ui.label(format!("editing #{index}"));
                    return;
                }
                if ui.add_enabled(has_text, egui::Button::new("Send")).clicked() {
                    action = Some(Role::User);
                }
                if ui
                    .add_enabled(has_text, egui::Button::new("Stream as character"))
                    .clicked()
                {
                    action = Some(Role::Character);
                }
                if ui.button("Demo reply").clicked() {
                    self.start_stream(DEMO_REPLY);
                }
                if ui.add_enabled(streaming, egui::Button::new("Stop")).clicked() {
                    self.stop_stream();
                }
                if ui.button("Clear chat").clicked() {
                    self.active_stream = None;
                    self.editing_message = None;
                    let signals = self.chat.clear(&mut self.document);
                    self.dispatch(signals);
                }
            });

            if let Some(role) = action {
                self.submit(role, ctx);
            }
        });
    }
}

impl eframe::App for StyleboxApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_events(ctx);
        self.render_top_bar(ctx);
        self.render_left_panel(ctx);
        self.render_center_panel(ctx);
        if self.active_stream.is_some() {
            ctx.request_repaint_after(self.config.stream_interval());
        }
    }
}
