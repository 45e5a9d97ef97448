use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModalKind {
    TrialForm,
    ContactForm,
    ThankYou,
    NoticeDetails,
}

/// Open/close state of the single dialog a view can show.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModalState {
    pub open: bool,
    pub kind: Option<ModalKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ModalState {
    pub fn open(&mut self, kind: ModalKind, data: Option<Value>) {
        self.open = true;
        self.kind = Some(kind);
        self.data = data;
    }

    /// Closes the dialog; kind and payload stay so a close animation can
    /// still render them.
    pub fn close(&mut self) {
        self.open = false;
    }

    pub fn set_data(&mut self, data: Option<Value>) {
        self.data = data;
    }
}
