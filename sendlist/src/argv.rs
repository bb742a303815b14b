use sendlist_common::{QueueFlags, RecipientError, address_parser::MAX_NAME};

use crate::resolver::Resolver;

impl Resolver {
    /// Send to every command-line argument as its own top-level list.
    ///
    /// `user at host` across three arguments is joined into `user@host`.
    /// When the joined form would not fit in an address, an overflow is
    /// reported and the arguments are sent one by one.
    pub fn send_to_argv<S: AsRef<str>>(&mut self, args: &[S]) {
        let mut index = 0;

        while let Some(arg) = args.get(index) {
            let arg = arg.as_ref();
            index += 1;

            let joined = match (args.get(index), args.get(index + 1)) {
                (Some(at), Some(host)) if at.as_ref().eq_ignore_ascii_case("at") => {
                    let host = host.as_ref();
                    if arg.len() + host.len() + 2 > MAX_NAME {
                        self.diagnostics
                            .user_error(None, &RecipientError::AddressOverflow);
                        None
                    } else {
                        index += 2;
                        Some(format!("{arg}@{host}"))
                    }
                }
                _ => None,
            };

            self.send_to(joined.as_deref().unwrap_or(arg), None, QueueFlags::EMPTY);
        }
    }
}
