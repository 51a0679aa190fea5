//! Broker launch contract used by [`BrokerClient`](crate::flows::BrokerClient).

// self
use crate::{_prelude::*, flows::BrokerRequestParameters};

/// Failures raised while handing a request to the broker application.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum InvokeError {
	/// The platform refused to open the broker or the install prompt.
	#[error("Failed to launch the broker: {message}.")]
	Launch {
		/// Platform-supplied detail.
		message: String,
	},
}

/// Hands outbound broker requests to the platform.
///
/// Implementations are chosen by presence: the client calls [`invoke_broker`] when
/// [`is_broker_installed`] reports `true` and [`prompt_broker_install`] otherwise.
///
/// [`invoke_broker`]: BrokerInvoker::invoke_broker
/// [`is_broker_installed`]: BrokerInvoker::is_broker_installed
/// [`prompt_broker_install`]: BrokerInvoker::prompt_broker_install
pub trait BrokerInvoker
where
	Self: Send + Sync,
{
	/// Reports whether a broker application is available on this device.
	fn is_broker_installed(&self) -> bool;

	/// Opens the broker with the fully rendered launch URL.
	fn invoke_broker(
		&self,
		launch_url: &Url,
		params: &BrokerRequestParameters,
	) -> Result<(), InvokeError>;

	/// Asks the user to install the broker; the request resumes once the broker answers.
	fn prompt_broker_install(
		&self,
		launch_url: &Url,
		params: &BrokerRequestParameters,
	) -> Result<(), InvokeError>;
}
