//! What an instructor hands out so students can find a session

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, Luma};
use qrcode::QrCode;
use rollcall_api::SessionCreated;
use rollcall_util::{AttendanceError, Result, SESSION_QUERY_PARAM, SessionId};

/// Path of the student check-in page
pub const STUDENT_ATTENDANCE_PATH: &str = "/student/attendance";

/// Smallest side of the rendered QR image, in pixels
const QR_MIN_SIZE: u32 = 256;

/// The three equivalent ways to reach a session, plus the QR image
#[derive(Debug, Clone)]
pub struct ShareArtifact {
    pub session_id: SessionId,
    /// `session_id=<id>`, the text inside the QR code
    pub qr_payload: String,
    /// `/student/attendance?session_id=<id>`
    pub link: String,
    /// The bare identifier, for typing in by hand
    pub manual_code: String,
    /// QR code as PNG
    pub qr_png: Vec<u8>,
}

impl ShareArtifact {
    pub fn for_session(session_id: &SessionId) -> Result<Self> {
        let qr_payload = format!("{}={}", SESSION_QUERY_PARAM, session_id);
        let link = format!("{}?{}", STUDENT_ATTENDANCE_PATH, qr_payload);
        let qr_png = render_qr_png(&qr_payload)?;

        Ok(Self {
            session_id: session_id.clone(),
            qr_payload,
            link,
            manual_code: session_id.to_string(),
            qr_png,
        })
    }

    /// The QR code as a `data:image/png;base64,...` URL
    pub fn qr_data_url(&self) -> String {
        format!("data:image/png;base64,{}", STANDARD.encode(&self.qr_png))
    }

    pub fn into_response(self) -> SessionCreated {
        let qr_code = self.qr_data_url();
        SessionCreated {
            session_id: self.session_id,
            qr_payload: self.qr_payload,
            link: self.link,
            qr_code,
            manual_code: self.manual_code,
            message: "Attendance session created successfully".into(),
        }
    }
}

fn render_qr_png(payload: &str) -> Result<Vec<u8>> {
    let code = QrCode::new(payload.as_bytes())
        .map_err(|e| AttendanceError::validation(format!("cannot encode QR code: {}", e)))?;

    let image = code
        .render::<Luma<u8>>()
        .min_dimensions(QR_MIN_SIZE, QR_MIN_SIZE)
        .build();
    let (width, height) = image.dimensions();

    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes)
        .write_image(image.as_raw(), width, height, ExtendedColorType::L8)
        .map_err(|e| AttendanceError::transient(format!("cannot render QR code: {}", e)))?;

    Ok(bytes)
}
