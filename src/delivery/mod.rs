//-
// Copyright (c) 2020, 2024, Jason Lingle
//
// This file is part of msmtpq.
//
// msmtpq is free software: you can  redistribute it and/or modify it under the
// terms of  the GNU General Public  License as published by  the Free Software
// Foundation, either version  3 of the License, or (at  your option) any later
// version.
//
// msmtpq is distributed  in the hope that  it will be useful,  but WITHOUT ANY
// WARRANTY; without  even the implied  warranty of MERCHANTABILITY  or FITNESS
// FOR  A PARTICULAR  PURPOSE.  See the  GNU General  Public  License for  more
// details.
//
// You should have received a copy of the GNU General Public License along with
// msmtpq. If not, see <http://www.gnu.org/licenses/>.

//! Hand-off of queued messages to the external mail transfer program.

mod sendmail;

pub use self::sendmail::Sendmail;

use crate::queue::message::MessageRecord;
use crate::support::error::Error;

/// Something which can take responsibility for delivering a message.
pub trait DeliveryAgent {
    /// Deliver `record`.
    ///
    /// On success, the agent has accepted the message and it no longer needs
    /// to be queued. Failures are reported as `Error::DeliveryStart`,
    /// `Error::DeliveryIo` or `Error::DeliveryFailed`. There are no retries
    /// at this level.
    fn deliver(&self, record: &MessageRecord) -> Result<(), Error>;
}

impl<'a, T: DeliveryAgent + ?Sized> DeliveryAgent for &'a T {
    fn deliver(&self, record: &MessageRecord) -> Result<(), Error> {
        (**self).deliver(record)
    }
}
