/*
    SPDX-License-Identifier: AGPL-3.0-or-later
    SPDX-FileCopyrightText: 2025 p2g-extract contributors
*/
pub mod collector;
pub mod device;
pub mod frame;
pub mod storage;
