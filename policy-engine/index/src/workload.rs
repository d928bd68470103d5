use mesh_authz_api::{self as api, Labels, ObjectRef};

/// Describes the workload whose policies are being selected.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Workload {
    pub namespace: String,
    pub labels: Labels,

    /// Resources the workload is attached to. Namespaced resources always
    /// carry a namespace.
    pub attachments: Vec<ObjectRef>,
}

impl Workload {
    pub fn new(namespace: impl ToString, labels: Labels) -> Self {
        Self {
            namespace: namespace.to_string(),
            labels,
            attachments: vec![],
        }
    }

    pub fn with_attachment(mut self, attachment: ObjectRef) -> Self {
        self.attachments.push(self.normalize(attachment));
        self
    }

    fn normalize(&self, mut attachment: ObjectRef) -> ObjectRef {
        let namespaced = attachment
            .target_kind()
            .map(|k| k.is_namespaced())
            .unwrap_or(true);
        if namespaced && attachment.namespace.is_none() {
            attachment.namespace = Some(self.namespace.clone());
        }
        attachment
    }
}

impl From<api::request::Workload> for Workload {
    fn from(w: api::request::Workload) -> Self {
        let workload = Self::new(w.namespace, Labels::from(w.labels));
        w.attachments
            .into_iter()
            .fold(workload, Workload::with_attachment)
    }
}
