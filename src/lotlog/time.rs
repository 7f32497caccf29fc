use super::error::LotLogError;

/// Converts a 12-hour `H:MM AM/PM` value into a 24-hour
/// `(hour, minute, second)` triple. Station logs carry no seconds.
pub fn decode_time(raw: &str) -> Result<(u32, u32, u32), LotLogError> {
    let malformed = || LotLogError::MalformedTime(raw.to_string());

    let (hour_part, rest) = raw.trim().split_once(':').ok_or_else(malformed)?;
    let rest = rest.trim();

    let minute_len = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    if minute_len != 2 {
        return Err(malformed());
    }
    let (minute_part, meridiem) = rest.split_at(minute_len);

    let hour = hour_part
        .trim()
        .parse::<u32>()
        .map_err(|_| malformed())?;
    let minute = minute_part.parse::<u32>().map_err(|_| malformed())?;

    let hour = match meridiem.trim().to_ascii_uppercase().as_str() {
        "PM" if hour != 12 => hour.checked_add(12).ok_or_else(malformed)?,
        "PM" => hour,
        "AM" if hour == 12 => 0,
        "AM" => hour,
        _ => return Err(malformed()),
    };

    // Stations sometimes write a 24-hour or zero hour; only reject what no
    // clock can show.
    if hour > 23 || minute > 59 {
        return Err(malformed());
    }

    Ok((hour, minute, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_time_handles_midnight_and_noon() {
        assert_eq!(decode_time("12:00AM").expect("midnight"), (0, 0, 0));
        assert_eq!(decode_time("12:00PM").expect("noon"), (12, 0, 0));
    }

    #[test]
    fn decode_time_shifts_afternoon_hours() {
        assert_eq!(decode_time("1:05PM").expect("afternoon"), (13, 5, 0));
        assert_eq!(decode_time("11:59PM").expect("late evening"), (23, 59, 0));
        assert_eq!(decode_time("9:30AM").expect("morning"), (9, 30, 0));
    }

    #[test]
    fn decode_time_accepts_spacing_and_lowercase_suffix() {
        assert_eq!(decode_time("  3:07 pm ").expect("spaced"), (15, 7, 0));
        assert_eq!(decode_time("10:15 am").expect("lowercase"), (10, 15, 0));
    }

    #[test]
    fn decode_time_keeps_hours_outside_the_twelve_hour_dial() {
        assert_eq!(decode_time("0:30AM").expect("zero hour"), (0, 30, 0));
        assert_eq!(decode_time("13:15AM").expect("24-hour value"), (13, 15, 0));
    }

    #[test]
    fn decode_time_rejects_malformed_values() {
        for raw in ["", "1305", "1:05", "1:5PM", "13:00PM", "24:00AM", "1:75AM", "x:05PM", "1:05XM"] {
            let err = decode_time(raw).expect_err("value should be rejected");
            assert!(matches!(err, LotLogError::MalformedTime(_)), "{raw}");
        }
    }
}
