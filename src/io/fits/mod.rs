// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Helper functions for reading and writing FITS files.
//!
//! All of these attach the caller's location to errors. Functions that use
//! cfitsio directly first make the relevant HDU current.

mod error;

pub use error::FitsError;

use std::{
    ffi::{CStr, CString},
    fmt::Display,
    os::raw::{c_char, c_int},
    path::Path,
    ptr,
};

use fitsio::{hdu::*, images::ImageDescription, FitsFile};
use ndarray::Array2;

// cfitsio buffer sizes (fitsio.h).
const FLEN_KEYWORD: usize = 75;
const FLEN_VALUE: usize = 71;
const FLEN_COMMENT: usize = 73;

// cfitsio data type codes (fitsio.h).
const TDOUBLE: c_int = 82;

/// The number of significant digits used for floating-point header values.
const DOUBLE_DIGITS: c_int = 17;

#[track_caller]
fn fitsio_error(
    fits_fptr: &FitsFile,
    hdu_description: impl Display,
    e: fitsio::errors::Error,
) -> FitsError {
    let caller = std::panic::Location::caller();
    FitsError::Fitsio {
        fits_error: Box::new(e),
        fits_filename: fits_fptr.file_path().to_path_buf().into_boxed_path(),
        hdu_description: format!("{hdu_description}").into_boxed_str(),
        source_file: caller.file(),
        source_line: caller.line(),
        source_column: caller.column(),
    }
}

#[track_caller]
fn fits_cstring(fits_fptr: &FitsFile, text: &str) -> Result<CString, FitsError> {
    CString::new(text).map_err(|_| {
        let caller = std::panic::Location::caller();
        FitsError::Nul {
            text: text.to_string().into_boxed_str(),
            fits_filename: fits_fptr.file_path().to_path_buf().into_boxed_path(),
            source_file: caller.file(),
            source_line: caller.line(),
            source_column: caller.column(),
        }
    })
}

/// Convert a cfitsio status into a [`FitsError`] against the current HDU.
#[track_caller]
fn fits_check_status(fits_fptr: &FitsFile, what: &str, status: c_int) -> Result<(), FitsError> {
    fitsio::errors::check_status(status).map_err(|e| fitsio_error(fits_fptr, what, e))
}

/// Open a fits file.
#[track_caller]
pub(crate) fn fits_open<P: AsRef<Path>>(file: P) -> Result<FitsFile, FitsError> {
    FitsFile::open(file.as_ref()).map_err(|e| {
        let caller = std::panic::Location::caller();
        FitsError::Open {
            fits_error: Box::new(e),
            fits_filename: file.as_ref().to_path_buf().into_boxed_path(),
            source_file: caller.file(),
            source_line: caller.line(),
            source_column: caller.column(),
        }
    })
}

/// Create a new fits file whose primary HDU is an image.
#[track_caller]
pub(crate) fn fits_create<P: AsRef<Path>>(
    file: P,
    primary: &ImageDescription,
) -> Result<FitsFile, FitsError> {
    FitsFile::create(file.as_ref())
        .with_custom_primary(primary)
        .open()
        .map_err(|e| {
            let caller = std::panic::Location::caller();
            FitsError::Open {
                fits_error: Box::new(e),
                fits_filename: file.as_ref().to_path_buf().into_boxed_path(),
                source_file: caller.file(),
                source_line: caller.line(),
                source_column: caller.column(),
            }
        })
}

/// Open a fits file's HDU.
#[track_caller]
pub(crate) fn fits_open_hdu<T: DescribesHdu + Display + Copy>(
    fits_fptr: &mut FitsFile,
    hdu_description: T,
) -> Result<FitsHdu, FitsError> {
    fits_fptr
        .hdu(hdu_description)
        .map_err(|e| fitsio_error(fits_fptr, hdu_description, e))
}

/// Open a HDU by name, if it exists.
#[track_caller]
pub(crate) fn fits_get_optional_hdu(
    fits_fptr: &mut FitsFile,
    name: &str,
) -> Result<Option<FitsHdu>, FitsError> {
    match fits_fptr.hdu(name) {
        Ok(hdu) => Ok(Some(hdu)),
        Err(e) => match &e {
            // 301 = "HDU not found".
            fitsio::errors::Error::Fits(fe) if fe.status == 301 => Ok(None),
            _ => Err(fitsio_error(fits_fptr, name, e)),
        },
    }
}

/// Move cfitsio's current HDU to `hdu`.
#[track_caller]
fn fits_make_current(fits_fptr: &mut FitsFile, hdu: &FitsHdu) -> Result<(), FitsError> {
    let mut status = 0;
    unsafe {
        // ffmahd = fits_movabs_hdu
        fitsio_sys::ffmahd(
            fits_fptr.as_raw(),         /* I - FITS file pointer             */
            hdu.number as c_int + 1,    /* I - number of the HDU to move to  */
            ptr::null_mut(),            /* O - type of extension, 0, 1, or 2 */
            &mut status,                /* IO - error status                 */
        );
    }
    fits_check_status(fits_fptr, &format!("{}", hdu.number + 1), status)
}

/// Given a FITS file pointer, a HDU that belongs to it, and a keyword that may
/// or may not exist, pull out the value of the keyword, parsing it into the
/// desired type.
#[track_caller]
pub(crate) fn fits_get_optional_key<T: std::str::FromStr>(
    fits_fptr: &mut FitsFile,
    hdu: &FitsHdu,
    keyword: &str,
) -> Result<Option<T>, FitsError> {
    let unparsed_value: String = match hdu.read_key(fits_fptr, keyword) {
        Ok(key_value) => key_value,
        Err(e) => match &e {
            // 202 = "keyword not found", 204 = "nonexistent keyword index".
            fitsio::errors::Error::Fits(fe) if matches!(fe.status, 202 | 204) => return Ok(None),
            _ => return Err(fitsio_error(fits_fptr, hdu.number + 1, e)),
        },
    };

    match unparsed_value.trim().parse() {
        Ok(parsed_value) => Ok(Some(parsed_value)),
        Err(_) => {
            let caller = std::panic::Location::caller();
            Err(FitsError::Parse {
                key: keyword.to_string().into_boxed_str(),
                fits_filename: fits_fptr.file_path().to_path_buf().into_boxed_path(),
                hdu_num: hdu.number + 1,
                source_file: caller.file(),
                source_line: caller.line(),
                source_column: caller.column(),
            })
        }
    }
}

/// Given a FITS file pointer, a HDU that belongs to it, and a keyword, pull out
/// the value of the keyword, parsing it into the desired type.
#[track_caller]
pub(crate) fn fits_get_required_key<T: std::str::FromStr>(
    fits_fptr: &mut FitsFile,
    hdu: &FitsHdu,
    keyword: &str,
) -> Result<T, FitsError> {
    match fits_get_optional_key(fits_fptr, hdu, keyword) {
        Ok(Some(value)) => Ok(value),
        Ok(None) => {
            let caller = std::panic::Location::caller();
            Err(FitsError::MissingKey {
                key: keyword.to_string().into_boxed_str(),
                fits_filename: fits_fptr.file_path().to_path_buf().into_boxed_path(),
                hdu_num: hdu.number + 1,
                source_file: caller.file(),
                source_line: caller.line(),
                source_column: caller.column(),
            })
        }
        Err(error) => Err(error),
    }
}

/// Given a FITS file pointer, and a keyword to a long string keyword that may
/// or may not exist, pull out the long string of the keyword. This deals with
/// FITSs CONTINUE mechanism by calling a low level fits function.
#[track_caller]
pub(crate) fn fits_get_optional_key_long_string(
    fits_fptr: &mut FitsFile,
    hdu: &FitsHdu,
    keyword: &str,
) -> Result<Option<String>, FitsError> {
    fits_make_current(fits_fptr, hdu)?;
    let keyword_ffi = fits_cstring(fits_fptr, keyword)?;
    let mut status = 0;
    let mut long_string_ptr = ptr::null_mut();
    unsafe {
        // ffgkls = fits_read_key_longstr
        fitsio_sys::ffgkls(
            fits_fptr.as_raw(),
            keyword_ffi.as_ptr(),
            &mut long_string_ptr,
            ptr::null_mut(),
            &mut status,
        );
    }
    match status {
        0 => {
            let long_string = unsafe {
                let s = CStr::from_ptr(long_string_ptr).to_string_lossy().into_owned();
                // Free the cfitsio-allocated string. The status code passed
                // isn't useful.
                // fffree = fits_free_memory
                fitsio_sys::fffree(long_string_ptr.cast(), &mut 0);
                s
            };
            Ok(Some(long_string))
        }
        202 | 204 => Ok(None),
        _ => {
            let caller = std::panic::Location::caller();
            Err(FitsError::LongString {
                key: keyword.to_string().into_boxed_str(),
                fits_filename: fits_fptr.file_path().to_path_buf().into_boxed_path(),
                hdu_num: hdu.number + 1,
                source_file: caller.file(),
                source_line: caller.line(),
                source_column: caller.column(),
            })
        }
    }
}

/// The dimensions of an image HDU, slowest-varying first (i.e. NAXISn, ...,
/// NAXIS1).
#[track_caller]
pub(crate) fn fits_get_image_dims(
    fits_fptr: &mut FitsFile,
    hdu: &FitsHdu,
) -> Result<Vec<usize>, FitsError> {
    if !matches!(hdu.info, HduInfo::ImageInfo { .. }) {
        let caller = std::panic::Location::caller();
        return Err(FitsError::NotImage {
            fits_filename: fits_fptr.file_path().to_path_buf().into_boxed_path(),
            hdu_num: hdu.number + 1,
            source_file: caller.file(),
            source_line: caller.line(),
            source_column: caller.column(),
        });
    }
    let naxis: usize = fits_get_required_key(fits_fptr, hdu, "NAXIS")?;
    let mut dims = Vec::with_capacity(naxis);
    for n in (1..=naxis).rev() {
        dims.push(fits_get_required_key(fits_fptr, hdu, &format!("NAXIS{n}"))?);
    }
    Ok(dims)
}

/// Given a FITS file pointer and a HDU, read the associated image.
#[track_caller]
pub(crate) fn fits_get_image<T: fitsio::images::ReadImage>(
    fits_fptr: &mut FitsFile,
    hdu: &FitsHdu,
) -> Result<T, FitsError> {
    match &hdu.info {
        HduInfo::ImageInfo { .. } => hdu
            .read_image(fits_fptr)
            .map_err(|e| fitsio_error(fits_fptr, hdu.number + 1, e)),
        _ => {
            let caller = std::panic::Location::caller();
            Err(FitsError::NotImage {
                fits_filename: fits_fptr.file_path().to_path_buf().into_boxed_path(),
                hdu_num: hdu.number + 1,
                source_file: caller.file(),
                source_line: caller.line(),
                source_column: caller.column(),
            })
        }
    }
}

/// Given a FITS file pointer and a HDU, write the image.
#[track_caller]
pub(crate) fn fits_write_image<T: fitsio::images::WriteImage>(
    fits_fptr: &mut FitsFile,
    hdu: &FitsHdu,
    data: &[T],
) -> Result<(), FitsError> {
    hdu.write_image(fits_fptr, data)
        .map_err(|e| fitsio_error(fits_fptr, hdu.number + 1, e))
}

#[track_caller]
fn fits_table_info<'a>(
    fits_fptr: &FitsFile,
    hdu: &'a FitsHdu,
) -> Result<(&'a [fitsio::tables::ConcreteColumnDescription], usize), FitsError> {
    match &hdu.info {
        HduInfo::TableInfo {
            column_descriptions,
            num_rows,
        } => Ok((column_descriptions, *num_rows)),
        _ => {
            let caller = std::panic::Location::caller();
            Err(FitsError::NotTable {
                fits_filename: fits_fptr.file_path().to_path_buf().into_boxed_path(),
                hdu_num: hdu.number + 1,
                source_file: caller.file(),
                source_line: caller.line(),
                source_column: caller.column(),
            })
        }
    }
}

/// The number of rows in a table HDU.
#[track_caller]
pub(crate) fn fits_get_num_rows(fits_fptr: &FitsFile, hdu: &FitsHdu) -> Result<usize, FitsError> {
    fits_table_info(fits_fptr, hdu).map(|(_, num_rows)| num_rows)
}

/// Does a table HDU have the named column?
#[track_caller]
pub(crate) fn fits_has_col(
    fits_fptr: &FitsFile,
    hdu: &FitsHdu,
    col_name: &str,
) -> Result<bool, FitsError> {
    let (cols, _) = fits_table_info(fits_fptr, hdu)?;
    Ok(cols.iter().any(|c| c.name.eq_ignore_ascii_case(col_name)))
}

/// Get a column from a fits file's HDU.
#[track_caller]
pub(crate) fn fits_get_col<T: fitsio::tables::ReadsCol>(
    fits_fptr: &mut FitsFile,
    hdu: &FitsHdu,
    col_name: &str,
) -> Result<Vec<T>, FitsError> {
    hdu.read_col(fits_fptr, col_name)
        .map_err(|e| fitsio_error(fits_fptr, hdu.number + 1, e))
}

/// Write a column to a fits file's HDU. Vector columns take all of their
/// rows' elements in order.
#[track_caller]
pub(crate) fn fits_write_col<T: fitsio::tables::WritesCol>(
    fits_fptr: &mut FitsFile,
    hdu: &FitsHdu,
    col_name: &str,
    data: &[T],
) -> Result<(), FitsError> {
    hdu.write_col(fits_fptr, col_name, data)
        .map(|_| ())
        .map_err(|e| fitsio_error(fits_fptr, hdu.number + 1, e))
}

/// Read a double-precision vector column with `width` elements per row, if
/// the column exists.
#[track_caller]
pub(crate) fn fits_get_optional_double_vector_col(
    fits_fptr: &mut FitsFile,
    hdu: &FitsHdu,
    col_name: &str,
    width: usize,
) -> Result<Option<Array2<f64>>, FitsError> {
    let num_rows = fits_get_num_rows(fits_fptr, hdu)?;
    fits_make_current(fits_fptr, hdu)?;
    let col_name_ffi = fits_cstring(fits_fptr, col_name)?;
    let mut status = 0;
    let mut i_col = 0;
    unsafe {
        // ffgcno = fits_get_colnum
        fitsio_sys::ffgcno(
            fits_fptr.as_raw(),                 /* I - FITS file pointer                      */
            0,                                  /* I - case sensitive string comparison? 0=no */
            col_name_ffi.as_ptr() as *mut _,    /* I - input name of column (w/wildcards)     */
            &mut i_col,                         /* O - number of the named column; 1=first col */
            &mut status,                        /* IO - error status                          */
        );
    }
    match status {
        // 219 = named column not found
        219 => return Ok(None),
        _ => fits_check_status(fits_fptr, col_name, status)?,
    }

    let mut values = vec![0.0; num_rows * width];
    if !values.is_empty() {
        unsafe {
            // ffgcv = fits_read_col
            fitsio_sys::ffgcv(
                fits_fptr.as_raw(),
                TDOUBLE,
                i_col,
                1,
                1,
                values.len() as i64,
                ptr::null_mut(),
                values.as_mut_ptr().cast(),
                &mut 0,
                &mut status,
            );
        }
        fits_check_status(fits_fptr, col_name, status)?;
    }
    Ok(Some(Array2::from_shape_fn((num_rows, width), |(i, j)| {
        values[i * width + j]
    })))
}

/// One header card.
#[derive(Debug, Clone)]
pub(crate) struct FitsCard {
    pub(crate) name: String,
    /// As written in the card; strings keep their quotes.
    pub(crate) value: String,
    pub(crate) comment: String,
}

/// Read every card in a HDU's header.
#[track_caller]
pub(crate) fn fits_get_cards(
    fits_fptr: &mut FitsFile,
    hdu: &FitsHdu,
) -> Result<Vec<FitsCard>, FitsError> {
    fits_make_current(fits_fptr, hdu)?;
    let hdu_description = format!("{}", hdu.number + 1);
    let mut status = 0;
    let mut num_cards = 0;
    unsafe {
        // ffghsp = fits_get_hdrspace
        fitsio_sys::ffghsp(
            fits_fptr.as_raw(), /* I - FITS file pointer                     */
            &mut num_cards,     /* O - number of existing keywords in header */
            ptr::null_mut(),    /* O - how many more keywords will fit       */
            &mut status,        /* IO - error status                         */
        );
    }
    fits_check_status(fits_fptr, &hdu_description, status)?;

    let mut cards = Vec::with_capacity(num_cards as usize);
    for i_card in 1..=num_cards {
        let mut name = [0 as c_char; FLEN_KEYWORD];
        let mut value = [0 as c_char; FLEN_VALUE];
        let mut comment = [0 as c_char; FLEN_COMMENT];
        let card = unsafe {
            // ffgkyn = fits_read_keyn
            fitsio_sys::ffgkyn(
                fits_fptr.as_raw(),     /* I - FITS file pointer             */
                i_card,                 /* I - number of the keyword to read */
                name.as_mut_ptr(),      /* O - name of the keyword           */
                value.as_mut_ptr(),     /* O - keyword value                 */
                comment.as_mut_ptr(),   /* O - keyword comment               */
                &mut status,            /* IO - error status                 */
            );
            FitsCard {
                name: CStr::from_ptr(name.as_ptr()).to_string_lossy().trim().to_string(),
                value: CStr::from_ptr(value.as_ptr()).to_string_lossy().trim().to_string(),
                comment: CStr::from_ptr(comment.as_ptr())
                    .to_string_lossy()
                    .trim_end()
                    .to_string(),
            }
        };
        fits_check_status(fits_fptr, &hdu_description, status)?;
        cards.push(card);
    }
    Ok(cards)
}

/// Write (or update) an integer keyword in the current HDU.
#[track_caller]
pub(crate) fn fits_write_int(
    fits_fptr: &mut FitsFile,
    keyname: &str,
    value: i64,
    comment: Option<&str>,
) -> Result<(), FitsError> {
    let keyname_ffi = fits_cstring(fits_fptr, keyname)?;
    let comment = comment.map(|c| fits_cstring(fits_fptr, c)).transpose()?;
    let mut status = 0;
    unsafe {
        // ffukyj = fits_update_key_lng
        fitsio_sys::ffukyj(
            fits_fptr.as_raw(),                                      /* I - FITS file pointer  */
            keyname_ffi.as_ptr(),                                    /* I - keyword name       */
            value,                                                   /* I - keyword value      */
            comment.as_ref().map_or(ptr::null(), |c| c.as_ptr()),    /* I - keyword comment    */
            &mut status,                                             /* IO - error status      */
        );
    }
    fits_check_status(fits_fptr, keyname, status)
}

/// Write (or update) a floating-point keyword in the current HDU with enough
/// significant digits to recover the value exactly.
#[track_caller]
pub(crate) fn fits_write_double(
    fits_fptr: &mut FitsFile,
    keyname: &str,
    value: f64,
    comment: Option<&str>,
) -> Result<(), FitsError> {
    let keyname_ffi = fits_cstring(fits_fptr, keyname)?;
    let comment = comment.map(|c| fits_cstring(fits_fptr, c)).transpose()?;
    let mut status = 0;
    unsafe {
        // ffukyd = fits_update_key_dbl
        fitsio_sys::ffukyd(
            fits_fptr.as_raw(),                                      /* I - FITS file pointer  */
            keyname_ffi.as_ptr(),                                    /* I - keyword name       */
            value,                                                   /* I - keyword value      */
            -DOUBLE_DIGITS,                                          /* I - no of decimals     */
            comment.as_ref().map_or(ptr::null(), |c| c.as_ptr()),    /* I - keyword comment    */
            &mut status,                                             /* IO - error status      */
        );
    }
    fits_check_status(fits_fptr, keyname, status)
}

/// Write (or update) a complex keyword, "(re, im)", in the current HDU.
#[track_caller]
pub(crate) fn fits_write_complex(
    fits_fptr: &mut FitsFile,
    keyname: &str,
    re: f64,
    im: f64,
    comment: Option<&str>,
) -> Result<(), FitsError> {
    let keyname_ffi = fits_cstring(fits_fptr, keyname)?;
    let comment = comment.map(|c| fits_cstring(fits_fptr, c)).transpose()?;
    let mut value = [re, im];
    let mut status = 0;
    unsafe {
        // ffukym = fits_update_key_dblcmp
        fitsio_sys::ffukym(
            fits_fptr.as_raw(),                                      /* I - FITS file pointer  */
            keyname_ffi.as_ptr(),                                    /* I - keyword name       */
            value.as_mut_ptr(),                                      /* I - keyword value      */
            -DOUBLE_DIGITS,                                          /* I - no of decimals     */
            comment.as_ref().map_or(ptr::null(), |c| c.as_ptr()),    /* I - keyword comment    */
            &mut status,                                             /* IO - error status      */
        );
    }
    fits_check_status(fits_fptr, keyname, status)
}

/// Write (or update) a logical keyword in the current HDU.
#[track_caller]
pub(crate) fn fits_write_bool(
    fits_fptr: &mut FitsFile,
    keyname: &str,
    value: bool,
    comment: Option<&str>,
) -> Result<(), FitsError> {
    let keyname_ffi = fits_cstring(fits_fptr, keyname)?;
    let comment = comment.map(|c| fits_cstring(fits_fptr, c)).transpose()?;
    let mut status = 0;
    unsafe {
        // ffukyl = fits_update_key_log
        fitsio_sys::ffukyl(
            fits_fptr.as_raw(),                                      /* I - FITS file pointer  */
            keyname_ffi.as_ptr(),                                    /* I - keyword name       */
            value as c_int,                                          /* I - keyword value      */
            comment.as_ref().map_or(ptr::null(), |c| c.as_ptr()),    /* I - keyword comment    */
            &mut status,                                             /* IO - error status      */
        );
    }
    fits_check_status(fits_fptr, keyname, status)
}

/// Write a string keyword in the current HDU, continuing it over multiple
/// cards if it's long.
#[track_caller]
pub(crate) fn fits_write_string(
    fits_fptr: &mut FitsFile,
    keyname: &str,
    value: &str,
    comment: Option<&str>,
) -> Result<(), FitsError> {
    let keyname_ffi = fits_cstring(fits_fptr, keyname)?;
    let value_ffi = fits_cstring(fits_fptr, value)?;
    let comment = comment.map(|c| fits_cstring(fits_fptr, c)).transpose()?;
    let mut status = 0;
    unsafe {
        // ffpkls = fits_write_key_longstr
        fitsio_sys::ffpkls(
            fits_fptr.as_raw(),                                      /* I - FITS file pointer        */
            keyname_ffi.as_ptr(),                                    /* I - name of keyword to write */
            value_ffi.as_ptr(),                                      /* I - keyword value            */
            comment.as_ref().map_or(ptr::null(), |c| c.as_ptr()),    /* I - keyword comment          */
            &mut status,                                             /* IO - error status            */
        );
    }
    fits_check_status(fits_fptr, keyname, status)
}

/// Write a COMMENT card in the current HDU.
#[track_caller]
pub(crate) fn fits_write_comment(fits_fptr: &mut FitsFile, comment: &str) -> Result<(), FitsError> {
    let comment_ffi = fits_cstring(fits_fptr, comment)?;
    let mut status = 0;
    unsafe {
        // ffpcom = fits_write_comment
        fitsio_sys::ffpcom(
            fits_fptr.as_raw(),
            comment_ffi.as_ptr(), /* I - comment string      */
            &mut status,          /* IO - error status       */
        );
    }
    fits_check_status(fits_fptr, "COMMENT", status)
}

/// Write HISTORY cards in the current HDU. Long lines are split over multiple
/// cards.
#[track_caller]
pub(crate) fn fits_write_history(fits_fptr: &mut FitsFile, history: &str) -> Result<(), FitsError> {
    let history_ffi = fits_cstring(fits_fptr, history)?;
    let mut status = 0;
    unsafe {
        // ffphis = fits_write_history
        fitsio_sys::ffphis(
            fits_fptr.as_raw(),
            history_ffi.as_ptr(), /* I - history string     */
            &mut status,          /* IO - error status      */
        );
    }
    fits_check_status(fits_fptr, "HISTORY", status)
}
